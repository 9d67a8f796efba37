use std::borrow::Cow;

use pretty_assertions::assert_eq;

use filter_rules::{passes, Field, FieldSource, RuleSet, RuleTable};

struct Job {
    title: &'static str,
    job_type: &'static str,
    location: &'static str,
    description: &'static str,
    skills: &'static [&'static str],
}

impl FieldSource for Job {
    fn field_text(&self, field: Field) -> Cow<'_, str> {
        match field {
            Field::Title => Cow::Borrowed(self.title),
            Field::JobType => Cow::Borrowed(self.job_type),
            Field::Location => Cow::Borrowed(self.location),
            Field::Description => Cow::Borrowed(self.description),
            Field::Skills => Cow::Owned(self.skills.join(" ")),
            _ => Cow::Borrowed(""),
        }
    }
}

fn fixture_rules() -> RuleSet {
    let table = RuleTable::from_json_str(include_str!("fixtures/rules.json")).expect("fixture");
    let compiled = RuleSet::from_table(&table);
    assert_eq!(compiled.rejected.len(), 1, "only the bogus condition is dropped");
    assert_eq!(compiled.rejected[0].index, 6);
    compiled.rules
}

const JOBS: &[Job] = &[
    Job {
        title: "Senior Python Engineer",
        job_type: "Freelance",
        location: "Remote",
        description: "At least 6 years of experience building APIs.",
        skills: &["Python", "Django"],
    },
    Job {
        title: "Backend Developer",
        job_type: "Full Time",
        location: "Madrid",
        description: "2 years of experience with Go services.",
        skills: &["Go", "PostgreSQL"],
    },
    Job {
        title: "Data Analyst",
        job_type: "Part Time",
        location: "Remote",
        description: "Curious mindset, SQL and dashboards.",
        skills: &["SQL", "Tableau"],
    },
];

fn surviving(query: &str, rules: &RuleSet) -> Vec<&'static str> {
    JOBS.iter()
        .filter(|job| passes(*job, query, rules))
        .map(|job| job.title)
        .collect()
}

#[test]
fn queries_filter_fixture_jobs() {
    let rules = fixture_rules();
    let cases: &[(&str, &[&str])] = &[
        (
            "python developer",
            &["Senior Python Engineer", "Backend Developer", "Data Analyst"],
        ),
        (
            "python developer not freelance",
            &["Backend Developer", "Data Analyst"],
        ),
        ("engineer not in remote", &["Backend Developer"]),
        (
            "engineer under 3 years of experience",
            &["Backend Developer", "Data Analyst"],
        ),
        (
            "analyst with more than 4 years of experience",
            &["Senior Python Engineer", "Data Analyst"],
        ),
        (
            "backend work without django",
            &["Backend Developer", "Data Analyst"],
        ),
        (
            "not senior, no python",
            &["Backend Developer", "Data Analyst"],
        ),
    ];

    for (query, expected) in cases {
        assert_eq!(surviving(query, &rules), expected.to_vec(), "query: {query}");
    }
}

#[test]
fn binding_once_matches_per_job_evaluation() {
    let rules = fixture_rules();
    let query = "remote role not freelance without sql";
    let bound = rules.bind(query);
    for job in JOBS {
        assert_eq!(bound.passes(job), passes(job, query, &rules), "{}", job.title);
    }
}

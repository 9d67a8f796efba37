//! Brute-force default rule table: negated job types, skills, locations and
//! seniorities plus experience bounds from 1 to 20 years.

use crate::table::{RuleSpec, RuleTable};

const NEGATIONS: &[&str] = &["not", "no", "without", "exclude"];

const JOB_TYPES: &[&str] = &[
    "Freelance",
    "Full Time",
    "Part Time",
    "Contract",
    "Internship",
    "Temporary",
];

const SKILLS: &[&str] = &[
    "Python", "TensorFlow", "PyTorch", "Java", "JavaScript", "SQL", "AWS", "Azure",
    "Google Cloud", "Docker", "Kubernetes", "C++", "C#", "Ruby", "PHP", "HTML", "CSS", "React",
    "Angular", "Vue", "Node.js", "Django", "Flask", "Spring", "Spark", "Hadoop", "Kafka",
    "MongoDB", "PostgreSQL", "MySQL", "Redis", "Elasticsearch", "GraphQL", "REST", "SOAP",
    "Linux", "Windows", "MacOS", "Android", "iOS", "Swift", "Kotlin", "Flutter", "Dart",
    "TypeScript", "Perl", "Scala", "Go", "Rust", "MATLAB", "R", "Julia", "Pandas", "NumPy",
    "SciPy", "Scikit-learn", "Keras", "OpenCV", "NLTK", "Spacy", "Hugging Face", "FastAPI",
    "Express", "Golang", "Terraform", "Ansible", "Jenkins", "Git", "GitHub", "GitLab",
    "Bitbucket", "Jira", "Confluence", "Slack", "Trello", "Asana", "Notion", "Figma", "Sketch",
    "Adobe XD", "Photoshop", "Illustrator", "InDesign",
];

const LOCATIONS: &[&str] = &[
    "Remote", "Fully Remote", "On-site", "Hybrid", "USA", "Europe", "Asia", "Africa",
    "Australia", "Canada", "UK", "Germany", "France", "Spain", "Italy", "Netherlands", "Sweden",
    "Denmark", "Norway", "Finland", "Japan", "China", "India", "Brazil", "Mexico", "Argentina",
    "Chile", "Colombia", "Peru", "New York", "California", "London", "Berlin", "Paris", "Tokyo",
    "Singapore", "Sydney", "Toronto", "Amsterdam", "Stockholm", "Barcelona", "Madrid", "Rome",
    "Zurich", "Dublin",
];

const SENIORITIES: &[&str] = &[
    "Senior", "Junior", "Mid-level", "Lead", "Principal", "Manager", "Director", "VP", "C-level",
    "Intern",
];

const EXPERIENCE: &[(&str, &str)] = &[
    ("less than", "less_than_years"),
    ("more than", "more_than_years"),
    ("at least", "at_least_years"),
    ("under", "under_years"),
    ("over", "over_years"),
];

const MAX_YEARS: u32 = 20;
const COMBO_LIMIT: usize = 20;

/// Builds the default rule table.
pub fn default_rule_table() -> RuleTable {
    let mut rules = Vec::new();

    for negation in NEGATIONS {
        for job_type in JOB_TYPES {
            rules.push(RuleSpec::new(
                format!("{negation} {}", job_type.to_lowercase()),
                "type",
                "not_contains",
                *job_type,
            ));
        }
    }

    for negation in NEGATIONS {
        for skill in SKILLS {
            rules.push(RuleSpec::new(
                format!("{negation} {}", skill.to_lowercase()),
                "skills",
                "not_contains",
                *skill,
            ));
        }
    }

    for negation in NEGATIONS {
        for location in LOCATIONS {
            rules.push(RuleSpec::new(
                format!("{negation} in {}", location.to_lowercase()),
                "location",
                "not_contains",
                *location,
            ));
        }
    }

    for negation in NEGATIONS {
        for seniority in SENIORITIES {
            rules.push(RuleSpec::new(
                format!("{negation} {}", seniority.to_lowercase()),
                "title",
                "not_contains",
                *seniority,
            ));
        }
    }

    for (phrase, condition) in EXPERIENCE {
        for years in 1..=MAX_YEARS {
            rules.push(RuleSpec::new(
                format!("{phrase} {years} years of experience"),
                "description",
                *condition,
                years.to_string(),
            ));
        }
    }

    // "not remote python": one rule per excluded dimension.
    for negation in NEGATIONS {
        for skill in &SKILLS[..COMBO_LIMIT] {
            for location in &LOCATIONS[..COMBO_LIMIT] {
                let pattern = format!(
                    "{negation} {} {}",
                    location.to_lowercase(),
                    skill.to_lowercase()
                );
                rules.push(RuleSpec::new(pattern.clone(), "skills", "not_contains", *skill));
                rules.push(RuleSpec::new(pattern, "location", "not_contains", *location));
            }
        }
    }

    RuleTable::new(rules)
}

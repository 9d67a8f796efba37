use serde::Serialize;

use crate::ranker::RankedCandidate;

#[derive(Serialize)]
struct PromptJob<'a> {
    id: &'a str,
    title: &'a str,
    company: &'a str,
    skills: &'a [String],
    location: &'a str,
    #[serde(rename = "type")]
    job_type: &'a str,
    similarity_score: String,
}

/// Renders the explanation prompt for `query` over `candidates`, in rank order.
pub fn build_prompt(query: &str, candidates: &[RankedCandidate]) -> String {
    let jobs: Vec<PromptJob<'_>> = candidates
        .iter()
        .map(|candidate| PromptJob {
            id: candidate.job_id.as_str(),
            title: &candidate.job.title,
            company: &candidate.job.company,
            skills: &candidate.job.skills,
            location: &candidate.job.location,
            job_type: &candidate.job.job_type,
            similarity_score: format!("{:.4}", candidate.similarity),
        })
        .collect();
    let listing = serde_json::to_string_pretty(&jobs).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = String::new();
    prompt.push_str("You are an AI career assistant helping to explain job recommendations.\n\n");
    prompt.push_str(&format!("USER QUERY: \"{query}\"\n\n"));
    prompt.push_str("JOB LISTINGS (ordered by relevance):\n");
    prompt.push_str(&listing);
    prompt.push_str("\n\nYour task:\n");
    prompt.push_str(
        "1. Provide a brief overview explaining how these jobs match the user's search query.\n",
    );
    prompt.push_str(
        "2. For each job, provide a short personalized explanation of why it might be a good fit based on the query.\n",
    );
    prompt.push_str(
        "3. If any jobs don't fully match some criteria in the query (like location preferences, experience level, job type), mention it.\n",
    );
    prompt.push_str("4. Format your response as a JSON with these keys:\n");
    prompt.push_str("   - \"overall_explanation\": A paragraph explaining the overall match\n");
    prompt.push_str(
        "   - \"job_explanations\": A dictionary with job IDs as keys and explanations as values\n\n",
    );
    prompt.push_str(
        "Keep explanations concise and focused on the match between query and job requirements.\n",
    );
    prompt
}

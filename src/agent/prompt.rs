//! Prompt builder for generation runs
//!
//! Builds the two static inputs of a run: the system prompt (rules, platform
//! profile, style, mode addendum) and the user brief for the job. Nothing
//! from earlier jobs is ever included.

use crate::agent::Platform;
use crate::state_machine::Job;
use crate::tools::ToolMode;

const BASE_RULES: &str = "You are a ghostwriter producing publish-ready social content. \
Write in plain, specific language. Prefer concrete numbers, names and examples over \
abstractions. Never use filler openers, stock motivational phrases or hashtag walls. \
When you are done, reply with the final content only, with no preamble.";

const DEFAULT_MODE: &str = "You may call `search_examples` to see how past posts on this \
platform were written, and `validate_content` to score a draft against the rubric. Both \
are optional.";

const THINKING_MODE: &str = "Work in exactly this order:\n\
1. Write a first draft.\n\
2. Call `validate_content` with the full draft.\n\
3. If the decision is `revise`, call `apply_fixes` once with the draft and the returned \
issues. Do not call it a second time.\n\
4. Reply with the final content. After the content, append a fenced ```json block with \
`final_content`, `original_score`, `issues` and `ai_percentage` from the validation.";

/// Compose the system prompt for a job.
pub fn system_prompt(job: &Job, mode: ToolMode) -> String {
    let profile = job.platform.profile();
    let mut prompt = String::new();

    prompt.push_str(BASE_RULES);
    prompt.push_str("\n\n");

    prompt.push_str(&format!("## PLATFORM: {}\n\n", profile.display_name));
    prompt.push_str(profile.guidance);
    prompt.push_str(&format!(
        "\n\n- Unit limit: {} characters\n- Total limit: {} characters\n- Hashtags: at most {}\n\n",
        profile.unit_char_limit, profile.total_char_limit, profile.max_hashtags
    ));

    if job.style != "default" && !job.style.trim().is_empty() {
        prompt.push_str(&format!("## STYLE\n\nWrite in the '{}' style.\n\n", job.style));
    }

    prompt.push_str("## TOOLS\n\n");
    prompt.push_str(match mode {
        ToolMode::Default => DEFAULT_MODE,
        ToolMode::Thinking => THINKING_MODE,
    });
    prompt.push('\n');

    prompt
}

/// The user turn that opens the conversation.
pub fn job_brief(job: &Job) -> String {
    let mut brief = String::new();
    brief.push_str(&format!(
        "Write a {} piece about: {}\n",
        platform_noun(job.platform),
        job.topic.trim()
    ));

    if !job.context.trim().is_empty() {
        brief.push_str("\nContext:\n");
        brief.push_str(job.context.trim());
        brief.push('\n');
    }

    brief.push_str(&format!(
        "\nTarget quality score: {} / 25.\n",
        job.target_score
    ));

    if let Some(date) = job.publish_date {
        brief.push_str(&format!("Scheduled to publish on {}.\n", date.format("%A %d %B %Y")));
    }

    brief
}

/// Prompt for the single-shot rewrite performed by `apply_fixes`.
pub fn fix_prompt(content: &str, issues: &[String], platform: Platform) -> String {
    let mut prompt = format!(
        "Revise this {} draft. Fix every issue listed and change nothing else. \
         Reply with the revised draft only.\n\n## ISSUES\n\n",
        platform.profile().display_name
    );
    for issue in issues {
        prompt.push_str(&format!("- {issue}\n"));
    }
    prompt.push_str("\n## DRAFT\n\n");
    prompt.push_str(content);
    prompt
}

fn platform_noun(platform: Platform) -> &'static str {
    match platform {
        Platform::LinkedIn => "LinkedIn post",
        Platform::Twitter => "X thread",
        Platform::Threads => "Threads post",
        Platform::Instagram => "Instagram caption",
        Platform::YoutubeShort => "YouTube Shorts script",
        Platform::Newsletter => "newsletter",
    }
}

// Per-step prompts for the chat-completions API

use quillforge_core::domain::{GenerationStep, JobSettings};
use quillforge_core::port::GenerationContext;

/// Source text beyond this many characters is cut before prompting
const MAX_SOURCE_PROMPT_CHARS: usize = 12_000;

/// Completion budget per step (the body scales with the requested length)
pub fn max_tokens(step: GenerationStep, settings: &JobSettings) -> u32 {
    match step {
        GenerationStep::Title | GenerationStep::SeoTitle => 60,
        GenerationStep::MetaDescription => 120,
        GenerationStep::Body => settings.length.target_words() * 2,
    }
}

pub fn system_prompt(settings: &JobSettings) -> String {
    format!(
        "You are an experienced content writer. Write in {} with a {} tone. \
         Reply with the requested text only, without commentary.",
        settings.language, settings.tone
    )
}

pub fn user_prompt(
    step: GenerationStep,
    context: &GenerationContext,
    settings: &JobSettings,
) -> String {
    let mut prompt = match step {
        GenerationStep::Title => format!(
            "Write one engaging article title about \"{}\". \
             It must be at least 40 characters long.",
            context.keyword
        ),
        GenerationStep::SeoTitle => format!(
            "Write an SEO title (under 60 characters) for an article titled \"{}\" \
             targeting the keyword \"{}\".",
            context.title.as_deref().unwrap_or(&context.keyword),
            context.keyword
        ),
        GenerationStep::MetaDescription => format!(
            "Write a meta description (under 160 characters) for an article titled \"{}\" \
             about \"{}\".",
            context.title.as_deref().unwrap_or(&context.keyword),
            context.keyword
        ),
        GenerationStep::Body => body_prompt(context, settings),
    };

    if let Some(source) = &context.source_text {
        prompt.push_str("\n\nBase the content on this source material:\n\"\"\"\n");
        prompt.extend(source.chars().take(MAX_SOURCE_PROMPT_CHARS));
        prompt.push_str("\n\"\"\"");
    }
    prompt
}

fn body_prompt(context: &GenerationContext, settings: &JobSettings) -> String {
    let mut prompt = format!(
        "Write an article of about {} words titled \"{}\" about \"{}\". Use Markdown with ## headings.",
        settings.length.target_words(),
        context.title.as_deref().unwrap_or(&context.keyword),
        context.keyword
    );
    if let Some(meta) = &context.meta_description {
        prompt.push_str(&format!(" The article should deliver on this summary: {}", meta));
    }
    if settings.outline_mode {
        prompt.push_str(" Plan an outline of section headings first, then write every section in order.");
    }
    if settings.insert_featured_image {
        prompt.push_str(" Start with a line [FEATURED IMAGE: short description].");
    }
    if settings.insert_inline_images {
        prompt.push_str(" After some sections add a line [IMAGE: short description].");
    }
    prompt
}

/// Tidy a completion for storage: single-line fields lose wrapping quotes
pub fn clean_output(step: GenerationStep, text: &str) -> String {
    let text = text.trim();
    match step {
        GenerationStep::Body => text.to_string(),
        _ => {
            let first_line = text.lines().next().unwrap_or_default().trim();
            first_line
                .trim_matches(|c| c == '"' || c == '\'' || c == '*')
                .trim()
                .to_string()
        }
    }
}

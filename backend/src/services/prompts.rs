//! Prompt templates for the text and image models.
//!
//! Every builder takes the output language and appends the matching
//! instruction; `auto` leaves the language to the model.

use super::ai_service::{DescriptionEntry, OutlineItem, OutlinePage, ProjectContext};
use crate::database::models::CreationType;

const OUTLINE_FORMAT: &str = r#"Return a JSON array only. Each element is either a page:
  {"title": "Page title", "points": ["point 1", "point 2"]}
or a part grouping several pages:
  {"part": "Part name", "pages": [{"title": "...", "points": ["..."]}]}
Do not wrap the JSON in any other text."#;

pub fn language_instruction(language: &str) -> &'static str {
    match language {
        "zh" => "Write all output in Simplified Chinese.",
        "en" => "Write all output in English.",
        "ja" => "Write all output in Japanese.",
        _ => "",
    }
}

fn with_language(prompt: String, language: &str) -> String {
    let instruction = language_instruction(language);
    if instruction.is_empty() {
        prompt
    } else {
        format!("{prompt}\n\n{instruction}")
    }
}

fn outline_json(outline: &[OutlineItem]) -> String {
    serde_json::to_string_pretty(outline).unwrap_or_default()
}

fn requirement_history(previous: &[String]) -> String {
    if previous.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = previous
        .iter()
        .enumerate()
        .map(|(index, requirement)| format!("{}. {}", index + 1, requirement))
        .collect();
    format!(
        "\nEarlier change requests (already applied):\n{}\n",
        lines.join("\n")
    )
}

/// The user's original input, phrased for the creation type.
fn project_input(context: &ProjectContext) -> String {
    let mut input = String::new();
    if let Some(idea) = context.idea_prompt.as_deref().filter(|v| !v.is_empty()) {
        input.push_str(&format!("Presentation idea:\n{idea}\n"));
    }
    if context.creation_type != CreationType::Idea {
        if let Some(outline) = context.outline_text.as_deref().filter(|v| !v.is_empty()) {
            input.push_str(&format!("\nUser outline:\n{outline}\n"));
        }
        if let Some(descriptions) = context.description_text.as_deref().filter(|v| !v.is_empty()) {
            input.push_str(&format!("\nUser page descriptions:\n{descriptions}\n"));
        }
    }
    input
}

pub fn outline_generation(context: &ProjectContext, language: &str) -> String {
    let prompt = format!(
        "You are planning a slide deck.\n\n{}\n\
         Design a clear outline for this presentation. Group pages into parts only when the \
         deck is long enough to benefit from sections. Each page needs a short title and 2 to 5 \
         key points.\n\n{OUTLINE_FORMAT}",
        project_input(context)
    );
    with_language(prompt, language)
}

pub fn outline_parsing(context: &ProjectContext, language: &str) -> String {
    let prompt = format!(
        "The user wrote the following outline for a slide deck:\n\n{}\n\n\
         Split it into pages without changing the user's wording. Keep any section headings as \
         parts.\n\n{OUTLINE_FORMAT}",
        context.outline_text.as_deref().unwrap_or_default()
    );
    with_language(prompt, language)
}

pub fn description_to_outline(context: &ProjectContext, language: &str) -> String {
    let prompt = format!(
        "The user described every page of a slide deck:\n\n{}\n\n\
         Extract the outline: one page per described slide, with its title and key points.\n\n\
         {OUTLINE_FORMAT}",
        context.description_text.as_deref().unwrap_or_default()
    );
    with_language(prompt, language)
}

pub fn description_split(context: &ProjectContext, outline: &[OutlineItem], language: &str) -> String {
    let prompt = format!(
        "The user described every page of a slide deck:\n\n{}\n\n\
         The deck has this outline:\n{}\n\n\
         Split the text into one description per page of the outline, in order, keeping the \
         user's wording. Return a JSON array of strings only, one string per page.",
        context.description_text.as_deref().unwrap_or_default(),
        outline_json(outline)
    );
    with_language(prompt, language)
}

pub fn outline_refinement(
    current: &[OutlineItem],
    requirement: &str,
    context: &ProjectContext,
    previous: &[String],
    language: &str,
) -> String {
    let current = if current.is_empty() {
        "(the outline is empty)".to_string()
    } else {
        outline_json(current)
    };
    let prompt = format!(
        "You are revising the outline of a slide deck.\n\n{}\n\
         Current outline:\n{current}\n{}\n\
         New change request:\n{requirement}\n\n\
         Apply the change request and return the complete revised outline.\n\n{OUTLINE_FORMAT}",
        project_input(context),
        requirement_history(previous)
    );
    with_language(prompt, language)
}

pub fn page_description(
    context: &ProjectContext,
    outline_text: &str,
    page: &OutlinePage,
    page_index: usize,
    language: &str,
) -> String {
    let part_info = page
        .part
        .as_deref()
        .map(|part| format!("\nThis page belongs to: {part}"))
        .unwrap_or_default();
    let prompt = format!(
        "You are writing the content of one slide.\n\n{}\n\
         Full outline:\n{outline_text}\n\n\
         Page {page_index}: {}{part_info}\nKey points: {}\n\n\
         Write the slide description: the page title, the text that should appear on the slide, \
         and any notes on visual elements. Keep it concise and ready to be rendered as a slide. \
         Output the description text only.",
        project_input(context),
        page.title,
        page.points.join("; ")
    );
    with_language(prompt, language)
}

pub fn descriptions_refinement(
    current: &[DescriptionEntry],
    requirement: &str,
    context: &ProjectContext,
    outline: &[OutlineItem],
    previous: &[String],
    language: &str,
) -> String {
    let pages: Vec<String> = current
        .iter()
        .map(|entry| {
            format!(
                "Page {} ({}):\n{}",
                entry.index,
                entry.title,
                entry.description.as_deref().unwrap_or("(no description yet)")
            )
        })
        .collect();
    let prompt = format!(
        "You are revising the page descriptions of a slide deck.\n\n{}\n\
         Outline:\n{}\n\n\
         Current descriptions:\n{}\n{}\n\
         New change request:\n{requirement}\n\n\
         Apply the change request to the descriptions. Return a JSON array of strings only, \
         one description per page, in page order.",
        project_input(context),
        outline_json(outline),
        pages.join("\n\n"),
        requirement_history(previous)
    );
    with_language(prompt, language)
}

/// Inputs for the slide image prompt.
pub struct ImagePromptInput<'a> {
    pub page_description: &'a str,
    pub outline_text: &'a str,
    pub current_section: &'a str,
    pub page_index: usize,
    pub has_material_images: bool,
    pub has_template: bool,
    pub extra_requirements: Option<&'a str>,
    pub template_style: Option<&'a str>,
}

pub fn image_generation(input: &ImagePromptInput<'_>, language: &str) -> String {
    let mut prompt = format!(
        "Create slide {} of a presentation as a single finished image.\n\n\
         Deck outline:\n{}\n\nCurrent section: {}\n\nSlide content:\n{}\n",
        input.page_index, input.outline_text, input.current_section, input.page_description
    );
    if input.has_template {
        prompt.push_str(
            "\nThe first reference image is the design template. Follow its layout, colors, \
             typography and decorative style closely, but replace its text with this slide's content.\n",
        );
    } else if let Some(style) = input.template_style.filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!("\nVisual style: {style}\n"));
    }
    if input.has_material_images {
        prompt.push_str(
            "\nThe other reference images are materials that should appear on the slide.\n",
        );
    }
    if let Some(extra) = input.extra_requirements.filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!("\nAdditional requirements:\n{extra}\n"));
    }
    prompt.push_str("\nRender all text crisply and legibly. Do not add page numbers unless asked.");
    with_language(prompt, language)
}

pub fn image_edit(instruction: &str, original_description: Option<&str>) -> String {
    let mut prompt = format!(
        "Edit the slide in the reference image according to this instruction:\n{instruction}\n"
    );
    if let Some(description) = original_description.filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!("\nThe slide was originally described as:\n{description}\n"));
    }
    prompt.push_str("\nKeep everything the instruction does not mention unchanged.");
    prompt
}

pub fn material_image(prompt: &str) -> String {
    format!("Create an illustration for use on a presentation slide: {prompt}")
}

#[cfg(test)]
mod tests {
    use super::{image_edit, language_instruction, outline_generation};
    use crate::database::models::CreationType;
    use crate::services::ai_service::ProjectContext;

    #[test]
    fn auto_language_adds_no_instruction() {
        assert_eq!(language_instruction("auto"), "");
        let context = ProjectContext {
            idea_prompt: Some("Rust adoption".to_string()),
            outline_text: None,
            description_text: None,
            creation_type: CreationType::Idea,
        };
        let prompt = outline_generation(&context, "auto");
        assert!(prompt.contains("Rust adoption"));
        assert!(!prompt.contains("Write all output"));
        assert!(outline_generation(&context, "en").ends_with("Write all output in English."));
    }

    #[test]
    fn edit_prompt_mentions_original_description() {
        let prompt = image_edit("make it blue", Some("A title slide"));
        assert!(prompt.contains("make it blue"));
        assert!(prompt.contains("A title slide"));
    }
}

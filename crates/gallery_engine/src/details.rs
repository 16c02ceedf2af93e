use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetDetails {
    pub title: String,
    pub description: String,
}

const MENU_LABELS: &[&str] = &["home", "services", "projects", "about", "contact"];

static HEADINGS: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").ok());
static TITLE_CLASS: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse(r#"[class*="title"]"#).ok());
static PARAGRAPHS: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse(r#"p, [class*="description"]"#).ok());

/// Title and description of a widget, read from its `outerHTML`.
///
/// The title is the first heading longer than three characters, else
/// `Project <n>`. The description joins the distinct paragraph texts longer
/// than thirty characters that are neither navigation menus nor `n/m`
/// counters.
pub fn describe(html: &str, project_number: usize) -> WidgetDetails {
    let fragment = Html::parse_fragment(html);

    let title = [&*HEADINGS, &*TITLE_CLASS]
        .into_iter()
        .flatten()
        .flat_map(|selector| fragment.select(selector))
        .map(element_text)
        .find(|text| text.chars().count() > 3)
        .unwrap_or_else(|| format!("Project {project_number}"));

    let mut parts: Vec<String> = Vec::new();
    if let Some(selector) = PARAGRAPHS.as_ref() {
        for element in fragment.select(selector) {
            let text = element_text(element);
            if is_description(&text) && !parts.contains(&text) {
                parts.push(text);
            }
        }
    }

    WidgetDetails {
        title,
        description: parts.join(" "),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_description(text: &str) -> bool {
    if text.chars().count() <= 30 {
        return false;
    }
    !is_menu(text) && !is_counter(text)
}

/// Navigation bars render as a run of menu labels.
fn is_menu(text: &str) -> bool {
    let lower = text.to_lowercase();
    let labels = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| MENU_LABELS.contains(word))
        .count();
    labels >= 3
}

fn is_counter(text: &str) -> bool {
    match text.split_once('/') {
        Some((current, total)) => {
            !current.is_empty()
                && !total.is_empty()
                && current.chars().all(|c| c.is_ascii_digit())
                && total.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

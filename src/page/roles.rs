use crate::page::Element;

/// The explicit `role` attribute. Only the first token counts, matching how
/// browsers treat role fallback lists.
pub fn explicit_role(element: &Element) -> Option<&str> {
    element
        .attribute("role")
        .and_then(|value| value.split_whitespace().next())
}

/// The role a user agent assigns to an element without a `role` attribute.
pub fn implicit_role(element: &Element) -> Option<&'static str> {
    let role = match element.tag.as_str() {
        "a" | "area" if element.has_attribute("href") => "link",
        "button" => "button",
        "input" => return input_role(element.attribute("type")),
        "select" if element.has_attribute("multiple") => "listbox",
        "select" => "combobox",
        "textarea" => "textbox",
        "img" => "img",
        "nav" => "navigation",
        "main" => "main",
        "header" => "banner",
        "footer" => "contentinfo",
        "form" => "form",
        "table" => "table",
        "tr" => "row",
        "td" => "cell",
        "th" => "columnheader",
        "ul" | "ol" => "list",
        "li" => "listitem",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "dialog" => "dialog",
        "article" => "article",
        "aside" => "complementary",
        "section" => "region",
        "option" => "option",
        "progress" => "progressbar",
        _ => return None,
    };
    Some(role)
}

fn input_role(input_type: Option<&str>) -> Option<&'static str> {
    let input_type = input_type.unwrap_or("text").to_ascii_lowercase();
    let role = match input_type.as_str() {
        "button" | "submit" | "reset" | "image" => "button",
        "checkbox" => "checkbox",
        "radio" => "radio",
        "range" => "slider",
        "number" => "spinbutton",
        "search" => "searchbox",
        "text" | "email" | "tel" | "url" | "" => "textbox",
        _ => return None,
    };
    Some(role)
}

/// Explicit role if present, otherwise the implicit one.
pub fn role_of(element: &Element) -> Option<&str> {
    explicit_role(element).or_else(|| implicit_role(element))
}

/// Accessible name as exposed through `aria-label`.
pub fn accessible_label(element: &Element) -> Option<&str> {
    element
        .attribute("aria-label")
        .map(str::trim)
        .filter(|label| !label.is_empty())
}

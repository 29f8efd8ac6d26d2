// Minimal HTML text extraction. A deliberately small scanner, not an HTML
// parser: enough for the fixed result pages this service scrapes.

/// Extract the visible text of elements whose `class` attribute contains
/// `marker` as a whole class name. Only the text up to the next tag is
/// captured.
pub fn texts_by_class(html: &str, marker: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = html;

    while let Some(cls_pos) = rest.find("class=\"") {
        let after = &rest[cls_pos + 7..];
        let Some(quote_end) = after.find('"') else {
            break;
        };
        let classes = &after[..quote_end];
        let tag_rest = &after[quote_end + 1..];
        let Some(gt) = tag_rest.find('>') else {
            break;
        };
        let body = &tag_rest[gt + 1..];

        if classes.split_whitespace().any(|c| c == marker) {
            if let Some(lt) = body.find('<') {
                let text = decode_entities(body[..lt].trim());
                if !text.is_empty() {
                    out.push(text);
                }
            }
        }

        rest = body;
    }

    out
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
}

//! Small HTML building blocks shared by the portal pages.
//!
//! Pages are assembled from strings; everything that comes from users or
//! files goes through [`escape`] first.

use crate::forms::FieldErrors;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use std::fmt::Write;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encodes a query-string component.
pub fn url_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for b in text.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", b);
            }
        }
    }
    out
}

/// Wraps `body` in the common page layout.
pub fn page(title: &str, username: Option<&str>, body: &str) -> String {
    let login = match username {
        Some(name) => format!("<span class=\"user\">Logged in as {}</span>", escape(name)),
        None => "<span class=\"user\">Not logged in</span>".to_string(),
    };
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<title>{title}</title>\n<link rel=\"stylesheet\" href=\"/static/portal.css\">\n\
<script src=\"/static/formset.js\" defer></script>\n</head>\n<body>\n\
<nav><a href=\"/opstat/\">Site status</a> <a href=\"/siteinfo/\">Site metadata</a> \
<a href=\"/qcform/\">QC reports</a> {login}</nav>\n<main>\n<h1>{title}</h1>\n{body}\n</main>\n</body>\n</html>\n",
        title = escape(title),
        login = login,
        body = body
    )
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let title = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );
    page(&title, None, &format!("<p class=\"error\">{}</p>", escape(message)))
}

pub fn ok(html: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html)
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header(("Location", location))
        .finish()
}

/// Renders a banner paragraph, or nothing for an empty message.
pub fn message(msg: &str) -> String {
    if msg.is_empty() {
        String::new()
    } else {
        format!("<p class=\"message\">{}</p>", escape(msg))
    }
}

/// Renders a table. Cells are escaped.
pub fn table<S: AsRef<str>>(headers: &[S], rows: &[Vec<String>]) -> String {
    let mut out = String::from("<table>\n<thead><tr>");
    for h in headers {
        let _ = write!(out, "<th>{}</th>", escape(h.as_ref()));
    }
    out.push_str("</tr></thead>\n<tbody>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", escape(cell));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

/// Error list for one form field, empty if the field is valid.
pub fn field_errors(errors: &FieldErrors, field: &str) -> String {
    match errors.get(field) {
        Some(messages) if !messages.is_empty() => {
            let mut out = String::from("<ul class=\"errorlist\">");
            for m in messages {
                let _ = write!(out, "<li>{}</li>", escape(m));
            }
            out.push_str("</ul>");
            out
        }
        _ => String::new(),
    }
}

pub fn text_input(name: &str, label: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        "<p><label for=\"id_{n}\">{l}</label> <input type=\"text\" id=\"id_{n}\" name=\"{n}\" value=\"{v}\">{e}</p>\n",
        n = escape(name),
        l = escape(label),
        v = escape(value),
        e = field_errors(errors, name)
    )
}

pub fn date_input(name: &str, label: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        "<p><label for=\"id_{n}\">{l}</label> <input type=\"date\" id=\"id_{n}\" name=\"{n}\" value=\"{v}\">{e}</p>\n",
        n = escape(name),
        l = escape(label),
        v = escape(value),
        e = field_errors(errors, name)
    )
}

pub fn textarea(name: &str, label: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        "<p><label for=\"id_{n}\">{l}</label><br><textarea id=\"id_{n}\" name=\"{n}\" rows=\"4\" cols=\"80\">{v}</textarea>{e}</p>\n",
        n = escape(name),
        l = escape(label),
        v = escape(value),
        e = field_errors(errors, name)
    )
}

pub fn select<V: AsRef<str>, T: AsRef<str>>(
    name: &str,
    label: &str,
    choices: &[(V, T)],
    selected: &str,
    errors: &FieldErrors,
) -> String {
    let mut out = format!(
        "<p><label for=\"id_{n}\">{l}</label> <select id=\"id_{n}\" name=\"{n}\">",
        n = escape(name),
        l = escape(label)
    );
    for (value, text) in choices {
        let value = value.as_ref();
        let sel = if value == selected { " selected" } else { "" };
        let _ = write!(
            out,
            "<option value=\"{}\"{}>{}</option>",
            escape(value),
            sel,
            escape(text.as_ref())
        );
    }
    let _ = write!(out, "</select>{}</p>\n", field_errors(errors, name));
    out
}

pub fn radios<V: AsRef<str>, T: AsRef<str>>(
    name: &str,
    label: &str,
    choices: &[(V, T)],
    selected: &str,
    errors: &FieldErrors,
) -> String {
    let mut out = format!("<fieldset><legend>{}</legend>", escape(label));
    for (value, text) in choices {
        let value = value.as_ref();
        let checked = if value == selected { " checked" } else { "" };
        let _ = write!(
            out,
            "<label><input type=\"radio\" name=\"{}\" value=\"{}\"{}> {}</label> ",
            escape(name),
            escape(value),
            checked,
            escape(text.as_ref())
        );
    }
    let _ = write!(out, "{}</fieldset>\n", field_errors(errors, name));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape("<a href=\"x\">Tom & 'Jerry'</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn url_encode_keeps_unreserved() {
        assert_eq!(url_encode("public metadata"), "public%20metadata");
        assert_eq!(url_encode("Park Falls&x=1"), "Park%20Falls%26x%3D1");
        assert_eq!(url_encode("a-b_c.d~"), "a-b_c.d~");
    }

    #[test]
    fn select_marks_current_choice() {
        let html = select(
            "site",
            "Site",
            &[("pa", "Park Falls"), ("oc", "Lamont")],
            "oc",
            &FieldErrors::default(),
        );
        assert!(html.contains("<option value=\"oc\" selected>Lamont</option>"));
        assert!(html.contains("<option value=\"pa\">Park Falls</option>"));
    }

    #[test]
    fn errors_render_under_field() {
        let mut errors = FieldErrors::default();
        errors.add("contact", "Bad <format>");
        let html = text_input("contact", "Contact", "", &errors);
        assert!(html.contains("<li>Bad &lt;format&gt;</li>"));
    }
}

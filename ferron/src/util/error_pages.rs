use hyper::StatusCode;

/// Renders the body for a short-circuited response: the
/// operator's custom template if one is configured, substituting
/// `%%STATUS%%` with the numeric status code, else a minimal built-in page.
pub fn render_error_page(status: StatusCode, template: Option<&str>) -> String {
  match template {
    Some(template) => template.replace("%%STATUS%%", status.as_str()),
    None => format!(
      "<!DOCTYPE html><html><head><title>{status}</title></head><body><h1>{} {}</h1></body></html>",
      status.as_u16(),
      status.canonical_reason().unwrap_or("Error")
    ),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn custom_template_substitutes_status() {
    let page = render_error_page(StatusCode::NOT_FOUND, Some("<h1>Error %%STATUS%%</h1>"));
    assert_eq!(page, "<h1>Error 404</h1>");
  }

  #[test]
  fn falls_back_to_builtin_page() {
    let page = render_error_page(StatusCode::BAD_GATEWAY, None);
    assert!(page.contains("502"));
    assert!(page.contains("Bad Gateway"));
  }
}

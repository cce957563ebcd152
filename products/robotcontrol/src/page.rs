use base::{Vec2, log};

const TEMPLATE: &str = include_str!("../templates/index.html");

/// Values filled into the control page.
#[derive(Debug, Clone)]
pub struct PageConfig {
    pub size: Vec2<usize>,
    pub color: String,
    pub bgcolor: String,
    /// Port of the viewer socket; the page connects to it on its own host.
    pub ws_port: u16,
}

pub const DEFAULT_COLOR: &str = "#444";
pub const DEFAULT_BGCOLOR: &str = "#333";

/// Whether `value` may go into the page's `<style>` block: `#rgb`, `#rgba`,
/// `#rrggbb`, `#rrggbbaa` or a bare colour name.
pub fn is_css_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => {
            !value.is_empty() && value.len() <= 32 && value.chars().all(|c| c.is_ascii_alphabetic())
        }
    }
}

fn color_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if is_css_color(value) {
        value
    } else {
        log::warn!("ignoring invalid colour {:?}, using {}", value, default);
        default
    }
}

pub fn render(config: &PageConfig) -> String {
    TEMPLATE
        .replace("{{width}}", &config.size.x.to_string())
        .replace("{{height}}", &config.size.y.to_string())
        .replace("{{color}}", color_or(&config.color, DEFAULT_COLOR))
        .replace("{{bgcolor}}", color_or(&config.bgcolor, DEFAULT_BGCOLOR))
        .replace("{{ws_port}}", &config.ws_port.to_string())
}

//! Static theme table mapping interface elements to terminal colors.

use crossterm::style::Color;

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: &'static str,
    pub user_text: Color,
    pub assistant_text: Color,
    pub system_text: Color,
    pub error_text: Color,
    pub panel_border: Color,
    pub panel_title: Color,
    pub heading: Color,
    pub code: Color,
    pub toolbar_fg: Color,
    pub toolbar_bg: Color,
}

impl Theme {
    fn default_theme() -> Theme {
        Theme {
            name: "default",
            user_text: Color::Cyan,
            assistant_text: Color::Reset,
            system_text: Color::DarkGrey,
            error_text: Color::Red,
            panel_border: Color::DarkGrey,
            panel_title: Color::Yellow,
            heading: Color::Magenta,
            code: Color::Green,
            toolbar_fg: Color::Black,
            toolbar_bg: Color::Grey,
        }
    }

    fn dark() -> Theme {
        Theme {
            name: "dark",
            user_text: Color::Rgb { r: 125, g: 207, b: 255 },
            assistant_text: Color::Rgb { r: 220, g: 220, b: 220 },
            system_text: Color::Rgb { r: 110, g: 110, b: 110 },
            error_text: Color::Rgb { r: 240, g: 100, b: 100 },
            panel_border: Color::Rgb { r: 90, g: 90, b: 90 },
            panel_title: Color::Rgb { r: 255, g: 200, b: 90 },
            heading: Color::Rgb { r: 200, g: 140, b: 255 },
            code: Color::Rgb { r: 150, g: 220, b: 140 },
            toolbar_fg: Color::Rgb { r: 20, g: 20, b: 20 },
            toolbar_bg: Color::Rgb { r: 160, g: 160, b: 160 },
        }
    }

    fn light() -> Theme {
        Theme {
            name: "light",
            user_text: Color::DarkBlue,
            assistant_text: Color::Black,
            system_text: Color::DarkGrey,
            error_text: Color::DarkRed,
            panel_border: Color::DarkGrey,
            panel_title: Color::DarkMagenta,
            heading: Color::DarkMagenta,
            code: Color::DarkGreen,
            toolbar_fg: Color::White,
            toolbar_bg: Color::DarkGrey,
        }
    }

    fn mono() -> Theme {
        Theme {
            name: "mono",
            user_text: Color::Reset,
            assistant_text: Color::Reset,
            system_text: Color::Reset,
            error_text: Color::Reset,
            panel_border: Color::Reset,
            panel_title: Color::Reset,
            heading: Color::Reset,
            code: Color::Reset,
            toolbar_fg: Color::Reset,
            toolbar_bg: Color::Reset,
        }
    }
}

pub fn builtin_themes() -> Vec<Theme> {
    vec![
        Theme::default_theme(),
        Theme::dark(),
        Theme::light(),
        Theme::mono(),
    ]
}

pub fn find_theme(name: &str) -> Option<Theme> {
    builtin_themes()
        .into_iter()
        .find(|t| t.name.eq_ignore_ascii_case(name))
}

pub fn theme_names() -> Vec<&'static str> {
    builtin_themes().iter().map(|t| t.name).collect::<Vec<_>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup_is_case_insensitive() {
        assert!(find_theme("Dark").is_some());
        assert!(find_theme("default").is_some());
        assert!(find_theme("sparkle").is_none());
    }
}

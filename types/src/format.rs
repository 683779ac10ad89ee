//! Formatting commands understood by the rich-text editor.
//!
//! Each command maps to a wrapper tag plus a class string. The editor toggles
//! these wrappers around the current selection; classes use the dashboard's
//! utility-class vocabulary.

use thiserror::Error;

/// Every alignment class. Setting one clears the others.
pub const ALIGNMENT_CLASSES: [&str; 4] = ["text-left", "text-center", "text-right", "text-justify"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    #[must_use]
    pub const fn class(self) -> &'static str {
        match self {
            Self::Left => "text-left",
            Self::Center => "text-center",
            Self::Right => "text-right",
            Self::Justify => "text-justify",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "center" | "centre" => Some(Self::Center),
            "right" => Some(Self::Right),
            "justify" => Some(Self::Justify),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Unordered => "ul",
            Self::Ordered => "ol",
        }
    }

    #[must_use]
    pub const fn classes(self) -> &'static str {
        match self {
            Self::Unordered => "list-disc pl-6",
            Self::Ordered => "list-decimal pl-6",
        }
    }

    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Unordered => Self::Ordered,
            Self::Ordered => Self::Unordered,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("heading level must be between 1 and 6, got {0}")]
pub struct InvalidHeadingLevel(pub u8);

/// `h1` through `h6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    pub fn new(level: u8) -> Result<Self, InvalidHeadingLevel> {
        if (1..=6).contains(&level) {
            Ok(Self(level))
        } else {
            Err(InvalidHeadingLevel(level))
        }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self.0 {
            1 => "h1",
            2 => "h2",
            3 => "h3",
            4 => "h4",
            5 => "h5",
            _ => "h6",
        }
    }

    #[must_use]
    pub const fn classes(self) -> &'static str {
        match self.0 {
            1 => "text-3xl font-bold",
            2 => "text-2xl font-bold",
            3 => "text-xl font-semibold",
            _ => "text-lg font-semibold",
        }
    }
}

impl TryFrom<u8> for HeadingLevel {
    type Error = InvalidHeadingLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A toolbar formatting action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatCommand {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Heading(HeadingLevel),
    Align(Alignment),
    List(ListKind),
    Blockquote,
    Code,
}

impl FormatCommand {
    /// Wrapper element name.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Bold => "strong",
            Self::Italic => "em",
            Self::Underline => "u",
            Self::Strikethrough => "s",
            Self::Heading(level) => level.tag(),
            Self::Align(_) => "div",
            Self::List(kind) => kind.tag(),
            Self::Blockquote => "blockquote",
            Self::Code => "code",
        }
    }

    /// Space-separated classes the wrapper carries.
    #[must_use]
    pub const fn classes(self) -> &'static str {
        match self {
            Self::Bold => "font-bold",
            Self::Italic => "italic",
            Self::Underline => "underline",
            Self::Strikethrough => "line-through",
            Self::Heading(level) => level.classes(),
            Self::Align(alignment) => alignment.class(),
            Self::List(kind) => kind.classes(),
            Self::Blockquote => "border-l-4 pl-4 italic",
            Self::Code => "font-mono",
        }
    }

    /// Classes that cannot coexist with [`Self::classes`] on one wrapper.
    #[must_use]
    pub const fn exclusive_classes(self) -> &'static [&'static str] {
        match self {
            Self::Align(_) => &ALIGNMENT_CLASSES,
            _ => &[],
        }
    }

    /// Parse a toolbar action name such as `bold`, `h2`, `align-center` or `ol`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let command = match name.as_str() {
            "bold" | "strong" => Self::Bold,
            "italic" | "em" => Self::Italic,
            "underline" => Self::Underline,
            "strikethrough" | "strike" => Self::Strikethrough,
            "blockquote" | "quote" => Self::Blockquote,
            "code" => Self::Code,
            "ul" | "bullet-list" => Self::List(ListKind::Unordered),
            "ol" | "ordered-list" => Self::List(ListKind::Ordered),
            other => {
                if let Some(alignment) = other.strip_prefix("align-") {
                    return Alignment::parse(alignment).map(Self::Align);
                }
                let level = other.strip_prefix('h')?.parse::<u8>().ok()?;
                return HeadingLevel::new(level).ok().map(Self::Heading);
            }
        };
        Some(command)
    }
}

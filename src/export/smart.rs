//! Localized typographic quotes and dashes.

use crate::label::key_from_string;

/// Quote style selected by the `quoteslanguage` metadata key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Dutch,
    French,
    German,
    GermanGuillemets,
    Swedish,
}

impl Language {
    /// Parse a `quoteslanguage` value; unknown values keep English quotes.
    pub fn from_name(name: &str) -> Self {
        match key_from_string(name).as_str() {
            "nl" | "dutch" => Language::Dutch,
            "de" | "german" => Language::German,
            "germanguillemets" => Language::GermanGuillemets,
            "fr" | "french" => Language::French,
            "sv" | "swedish" => Language::Swedish,
            _ => Language::English,
        }
    }
}

/// A typographic mark produced by the smart punctuation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    LeftSingle,
    RightSingle,
    Apostrophe,
    LeftDouble,
    RightDouble,
    EnDash,
    EmDash,
    Ellipsis,
}

impl Quote {
    /// Plain ASCII rendering when smart typography is off.
    pub fn ascii(self) -> &'static str {
        match self {
            Quote::LeftSingle | Quote::RightSingle | Quote::Apostrophe => "'",
            Quote::LeftDouble | Quote::RightDouble => "\"",
            Quote::EnDash => "-",
            Quote::EmDash => "--",
            Quote::Ellipsis => "...",
        }
    }

    /// Unicode code point for this mark in `language`.
    pub fn codepoint(self, language: Language) -> u32 {
        use Language::*;
        match self {
            Quote::LeftSingle => match language {
                Swedish => 8217,
                French => 39,
                German => 8218,
                GermanGuillemets => 8250,
                _ => 8216,
            },
            Quote::RightSingle => match language {
                German => 8216,
                GermanGuillemets => 8249,
                _ => 8217,
            },
            Quote::Apostrophe => 8217,
            Quote::LeftDouble => match language {
                Dutch | German => 8222,
                GermanGuillemets => 187,
                French => 171,
                Swedish => 8221,
                English => 8220,
            },
            Quote::RightDouble => match language {
                Swedish | Dutch => 8221,
                German => 8220,
                GermanGuillemets => 171,
                French => 187,
                English => 8221,
            },
            Quote::EnDash => 8211,
            Quote::EmDash => 8212,
            Quote::Ellipsis => 8230,
        }
    }

    /// Numeric character reference, for HTML and XML outputs.
    pub fn entity(self, language: Language) -> String {
        format!("&#{};", self.codepoint(language))
    }

    /// LaTeX input for this mark in `language`.
    pub fn latex(self, language: Language) -> &'static str {
        use Language::*;
        match self {
            Quote::LeftSingle => match language {
                Swedish | French => "'",
                German => "‚",
                GermanGuillemets => "›",
                _ => "`",
            },
            Quote::RightSingle => match language {
                German => "`",
                GermanGuillemets => "‹",
                _ => "'",
            },
            Quote::Apostrophe => "'",
            Quote::LeftDouble => match language {
                Dutch | German => "„",
                GermanGuillemets => "»",
                French => "«",
                Swedish => "''",
                English => "``",
            },
            Quote::RightDouble => match language {
                Swedish | Dutch => "''",
                German => "``",
                GermanGuillemets => "«",
                French => "»",
                English => "''",
            },
            Quote::EnDash => "--",
            Quote::EmDash => "---",
            Quote::Ellipsis => "{\\ldots}",
        }
    }

    /// RTF control word or escape for this mark.
    pub fn rtf(self, language: Language) -> String {
        match self {
            Quote::LeftSingle | Quote::RightSingle | Quote::Apostrophe | Quote::LeftDouble
            | Quote::RightDouble => format!("\\u{}?", self.codepoint(language)),
            Quote::EnDash => "\\endash ".into(),
            Quote::EmDash => "\\emdash ".into(),
            Quote::Ellipsis => "\\u8230?".into(),
        }
    }
}

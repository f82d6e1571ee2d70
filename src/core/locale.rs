//! Language resolution and bilingual text
//!
//! Stored text that faces end users is kept in French and Arabic
//! ([`Localized`]). Each request resolves at most one [`Language`] from its
//! `Accept-Language` header, and everything the API returns (documents and
//! error messages) is shaped by that choice.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Languages the marketplace stores and serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Fr,
    Ar,
}

impl Language {
    /// Two-letter code, also the key used inside [`Localized`] documents
    pub fn code(&self) -> &'static str {
        match self {
            Language::Fr => "fr",
            Language::Ar => "ar",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fr" => Ok(Language::Fr),
            "ar" => Ok(Language::Ar),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

/// Resolve the preferred supported language from an `Accept-Language` value
///
/// Tags are ordered by their `q` weight (ties keep header order) and the
/// first one whose primary subtag is supported wins. Returns `None` when the
/// header is absent, empty, or names no supported language.
///
/// ```
/// use m3allem::core::locale::{resolve_language, Language};
///
/// assert_eq!(resolve_language(Some("ar-MA,fr;q=0.8")), Some(Language::Ar));
/// assert_eq!(resolve_language(Some("en-US")), None);
/// ```
pub fn resolve_language(header: Option<&str>) -> Option<Language> {
    let header = header?;

    let mut tags: Vec<(f32, &str)> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let tag = pieces.next()?.trim();
            if tag.is_empty() {
                return None;
            }
            let weight = pieces
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some((weight, tag))
        })
        .collect();

    // sort_by is stable, so equal weights keep header order
    tags.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    tags.into_iter()
        .filter(|(weight, _)| *weight > 0.0)
        .find_map(|(_, tag)| {
            let primary = tag.split(['-', '_']).next().unwrap_or(tag);
            primary.parse::<Language>().ok()
        })
}

/// Text stored in both supported languages
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Validate)]
pub struct Localized {
    #[validate(length(min = 1, message = "French text is required"))]
    pub fr: String,
    #[validate(length(min = 1, message = "Arabic text is required"))]
    pub ar: String,
}

impl Localized {
    pub fn new(fr: impl Into<String>, ar: impl Into<String>) -> Self {
        Self {
            fr: fr.into(),
            ar: ar.into(),
        }
    }

    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::Fr => &self.fr,
            Language::Ar => &self.ar,
        }
    }
}

/// User-facing messages, available in English, French and Arabic
///
/// English is the fallback when the request names no supported language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    RouteNotFound { path: String },
    DocumentNotFound,
    Unauthorized,
    Forbidden,
    ValidationFailed { details: String },
    DuplicateValue { field: String },
    InvalidQuery { details: String },
    InvalidBody { details: String },
    InternalError,
}

impl Message {
    /// Render the message in the given language (English when `None`)
    pub fn text(&self, language: Option<Language>) -> String {
        match (self, language) {
            (Message::RouteNotFound { path }, None) => {
                format!("Can't find {} on this server!", path)
            }
            (Message::RouteNotFound { path }, Some(Language::Fr)) => {
                format!("{} n'est pas trouvé sur ce serveur !", path)
            }
            (Message::RouteNotFound { path }, Some(Language::Ar)) => {
                format!("غير موجود على هذا الخادم {}!", path)
            }

            (Message::DocumentNotFound, None) => "No documents found with that ID!".to_string(),
            (Message::DocumentNotFound, Some(Language::Fr)) => {
                "Aucun document trouvé avec cet identifiant !".to_string()
            }
            (Message::DocumentNotFound, Some(Language::Ar)) => {
                "لم يتم العثور على أي مستند بهذا المعرف!".to_string()
            }

            (Message::Unauthorized, None) => {
                "You are not logged in! Please login to get access!".to_string()
            }
            (Message::Unauthorized, Some(Language::Fr)) => {
                "Vous n'êtes pas connecté ! Veuillez vous connecter pour accéder.".to_string()
            }
            (Message::Unauthorized, Some(Language::Ar)) => {
                "أنت غير مسجل الدخول! يرجى تسجيل الدخول للوصول.".to_string()
            }

            (Message::Forbidden, None) => {
                "You do not have permission to perform this action!".to_string()
            }
            (Message::Forbidden, Some(Language::Fr)) => {
                "Vous n'avez pas la permission d'effectuer cette action !".to_string()
            }
            (Message::Forbidden, Some(Language::Ar)) => {
                "ليس لديك الإذن للقيام بهذا الإجراء!".to_string()
            }

            (Message::ValidationFailed { details }, None) => {
                format!("Invalid input data: {}", details)
            }
            (Message::ValidationFailed { details }, Some(Language::Fr)) => {
                format!("Données invalides : {}", details)
            }
            (Message::ValidationFailed { details }, Some(Language::Ar)) => {
                format!("بيانات غير صالحة: {}", details)
            }

            (Message::DuplicateValue { field }, None) => {
                format!("Duplicate value for '{}', please use another value!", field)
            }
            (Message::DuplicateValue { field }, Some(Language::Fr)) => {
                format!("Valeur déjà utilisée pour '{}', veuillez en choisir une autre !", field)
            }
            (Message::DuplicateValue { field }, Some(Language::Ar)) => {
                format!("القيمة مستخدمة مسبقا للحقل '{}'، يرجى اختيار قيمة أخرى!", field)
            }

            (Message::InvalidQuery { details }, None) => {
                format!("Invalid query parameters: {}", details)
            }
            (Message::InvalidQuery { details }, Some(Language::Fr)) => {
                format!("Paramètres de requête invalides : {}", details)
            }
            (Message::InvalidQuery { details }, Some(Language::Ar)) => {
                format!("معايير الطلب غير صالحة: {}", details)
            }

            (Message::InvalidBody { details }, None) => {
                format!("Invalid request body: {}", details)
            }
            (Message::InvalidBody { details }, Some(Language::Fr)) => {
                format!("Corps de requête invalide : {}", details)
            }
            (Message::InvalidBody { details }, Some(Language::Ar)) => {
                format!("محتوى الطلب غير صالح: {}", details)
            }

            (Message::InternalError, None) => "Something went wrong!".to_string(),
            (Message::InternalError, Some(Language::Fr)) => {
                "Une erreur s'est produite !".to_string()
            }
            (Message::InternalError, Some(Language::Ar)) => "حدث خطأ ما!".to_string(),
        }
    }
}

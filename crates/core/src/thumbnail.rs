use std::fmt;

use crate::session::Session;

/// URI schemes Neos uses for assets stored in its own database.
pub const PLATFORM_SCHEMES: &[&str] = &["neosdb", "resdb"];

/// A session's raw thumbnail value, classified by what has to happen to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailRef {
    /// Absent, null, non-string or blank.
    Empty,
    /// Already points under the local thumbnail prefix.
    Local(String),
    /// Platform resource identifier such as `neosdb:///<hash>.webp`.
    Platform { scheme: String, path: String },
    /// Absolute http(s) URL that can be fetched as-is.
    Remote(String),
    Unsupported(String),
}

impl ThumbnailRef {
    pub fn classify(raw: Option<&str>, local_prefix: &str) -> Self {
        let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            return Self::Empty;
        };

        if !local_prefix.is_empty() && value.starts_with(local_prefix) {
            return Self::Local(value.to_string());
        }

        if let Some((scheme, rest)) = value.split_once(':') {
            if let Some(known) = PLATFORM_SCHEMES
                .iter()
                .find(|s| s.eq_ignore_ascii_case(scheme))
            {
                let path = rest.trim_start_matches('/');
                if path.is_empty() {
                    return Self::Unsupported(value.to_string());
                }
                return Self::Platform {
                    scheme: (*known).to_string(),
                    path: path.to_string(),
                };
            }
            if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") {
                return Self::Remote(value.to_string());
            }
        }

        Self::Unsupported(value.to_string())
    }

    /// Whether the value has to be preserved under `privThumbnail` and
    /// replaced. Empty and already-local values are left alone.
    pub fn needs_resolution(&self) -> bool {
        !matches!(self, Self::Empty | Self::Local(_))
    }
}

impl fmt::Display for ThumbnailRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Local(value) | Self::Remote(value) | Self::Unsupported(value) => {
                f.write_str(value)
            }
            Self::Platform { scheme, path } => write!(f, "{scheme}:///{path}"),
        }
    }
}

/// What the sync cycle does with one session's thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailPlan {
    /// Raw reference as returned by the API, kept as `privThumbnail`.
    pub original: String,
    /// Fetchable URL, `None` when the reference could not be resolved.
    pub resolved_url: Option<String>,
    /// Cache file name derived from `resolved_url`.
    pub file_name: Option<String>,
}

impl ThumbnailPlan {
    /// `(file_name, url)` when there is something to download.
    pub fn download(&self) -> Option<(&str, &str)> {
        match (&self.file_name, &self.resolved_url) {
            (Some(name), Some(url)) => Some((name.as_str(), url.as_str())),
            _ => None,
        }
    }
}

/// Build the plan for one session. `None` means the session is passed
/// through untouched.
pub fn plan_thumbnail<F>(session: &Session, local_prefix: &str, resolve: F) -> Option<ThumbnailPlan>
where
    F: FnOnce(&ThumbnailRef) -> Option<String>,
{
    let raw = session.thumbnail()?;
    let reference = ThumbnailRef::classify(Some(raw), local_prefix);
    if !reference.needs_resolution() {
        return None;
    }

    let resolved_url = resolve(&reference);
    let file_name = resolved_url.as_deref().and_then(cache_file_name);
    Some(ThumbnailPlan {
        original: raw.to_string(),
        resolved_url,
        file_name,
    })
}

/// Rewrite one session according to its plan.
///
/// The thumbnail becomes `local_prefix + file_name`. Without a usable file
/// name the field is dropped so no raw identifier or remote URL reaches the
/// browser.
pub fn apply_plan(session: &mut Session, plan: &ThumbnailPlan, local_prefix: &str) {
    session.set_priv_thumbnail(plan.original.clone());
    match &plan.file_name {
        Some(name) => session.set_thumbnail(local_thumbnail_path(local_prefix, name)),
        None => session.clear_thumbnail(),
    }
}

/// Copy of `sessions` with every planned thumbnail rewritten.
pub fn rewrite_sessions(
    sessions: &[Session],
    plans: &[Option<ThumbnailPlan>],
    local_prefix: &str,
) -> Vec<Session> {
    sessions
        .iter()
        .zip(plans)
        .map(|(session, plan)| {
            let mut session = session.clone();
            if let Some(plan) = plan {
                apply_plan(&mut session, plan, local_prefix);
            }
            session
        })
        .collect()
}

pub fn local_thumbnail_path(local_prefix: &str, file_name: &str) -> String {
    format!("{local_prefix}{file_name}")
}

/// File name for a cached thumbnail: the URL's final path segment,
/// percent-decoded, without query or fragment.
///
/// Names that are empty, start with `.` or would escape the cache directory
/// are rejected.
pub fn cache_file_name(url: &str) -> Option<String> {
    let without_suffix = url.split(['?', '#']).next().unwrap_or_default();
    let path = match without_suffix.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, path)| path).unwrap_or_default(),
        None => without_suffix,
    };
    let segment = path.rsplit('/').next().unwrap_or_default();
    let decoded = urlencoding::decode(segment).ok()?;

    if decoded.is_empty()
        || decoded.starts_with('.')
        || decoded.contains(['/', '\\', '\0'])
    {
        return None;
    }
    Some(decoded.into_owned())
}

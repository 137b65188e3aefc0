use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::{
    probe::FetchResult,
    types::{FeatureEntries, FeatureValue},
};

const MEDIA_SUFFIXES: [&str; 3] = [".png", ".jpg", ".mp4"];

/// Structural pieces of a fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlDocument {
    /// `href` of every anchor, `None` for anchors without one.
    pub anchors: Vec<Option<String>>,
    /// Serialized outer HTML of every `<form>`.
    pub forms: Vec<String>,
    /// Serialized outer HTML of every `<link>`.
    pub link_tags: Vec<String>,
    pub title: Option<String>,
}

impl HtmlDocument {
    /// Parses permissively; malformed markup yields whatever structure html5ever recovers.
    pub fn parse(body: &str) -> Self {
        let document = Html::parse_document(body);

        let anchors = select(&document, "a")
            .map(|a| a.value().attr("href").map(str::to_string))
            .collect();
        let forms = select(&document, "form").map(|f| f.html()).collect();
        let link_tags = select(&document, "link").map(|l| l.html()).collect();
        let title = select(&document, "title")
            .next()
            .map(|t| t.text().collect::<String>());

        Self {
            anchors,
            forms,
            link_tags,
            title,
        }
    }

    pub fn links(&self) -> impl Iterator<Item = &str> {
        self.anchors.iter().filter_map(|href| href.as_deref())
    }
}

fn select<'a>(document: &'a Html, css: &str) -> Box<dyn Iterator<Item = ElementRef<'a>> + 'a> {
    match Selector::parse(css) {
        Ok(selector) => Box::new(document.select(&selector).collect::<Vec<_>>().into_iter()),
        Err(e) => {
            warn!("Invalid selector {:?}: {:?}", css, e);
            Box::new(std::iter::empty())
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentFeatures {
    pub html: usize,
    pub nb_hyperlinks: usize,
    pub ratio_int_hyperlinks: f64,
    pub ratio_ext_hyperlinks: f64,
    pub ratio_int_media: f64,
    pub ratio_ext_media: f64,
    pub safe_anchor: f64,
    pub login_form: bool,
    pub empty_title: bool,
    pub nb_ext_css: usize,
    pub domain_with_copyright: bool,
    pub nb_redirection: bool,
}

impl Default for ContentFeatures {
    /// Values used when no page could be fetched.
    fn default() -> Self {
        Self {
            html: 0,
            nb_hyperlinks: 0,
            ratio_int_hyperlinks: 0.0,
            ratio_ext_hyperlinks: 0.0,
            ratio_int_media: 0.0,
            ratio_ext_media: 0.0,
            safe_anchor: 0.0,
            login_form: false,
            empty_title: true,
            nb_ext_css: 0,
            domain_with_copyright: false,
            nb_redirection: false,
        }
    }
}

impl ContentFeatures {
    pub fn analyze(fetch: &FetchResult, hostname: &str) -> Self {
        let body = match (&fetch.body, fetch.succeeded) {
            (Some(body), true) => body,
            _ => return Self::default(),
        };

        let document = HtmlDocument::parse(body);
        let total = document.anchors.len();

        let internal = document.links().filter(|l| l.contains(hostname)).count();
        let external = document
            .links()
            .filter(|l| !l.contains(hostname) && l.contains("http"))
            .count();

        let media: Vec<&str> = document
            .links()
            .filter(|l| MEDIA_SUFFIXES.iter().any(|ext| l.ends_with(ext)))
            .collect();
        let internal_media = media.iter().filter(|l| l.contains(hostname)).count();

        let fragments = document.links().filter(|l| l.contains('#')).count();

        Self {
            html: fetch.body_len(),
            nb_hyperlinks: total,
            ratio_int_hyperlinks: ratio(internal, total),
            ratio_ext_hyperlinks: ratio(external, total),
            ratio_int_media: ratio(internal_media, media.len()),
            ratio_ext_media: ratio(media.len() - internal_media, media.len()),
            safe_anchor: ratio(fragments, total),
            login_form: document
                .forms
                .iter()
                .any(|form| form.to_lowercase().contains("login")),
            empty_title: document
                .title
                .as_deref()
                .map(|t| t.trim().is_empty())
                .unwrap_or(true),
            nb_ext_css: document
                .link_tags
                .iter()
                .filter(|link| link.contains("stylesheet"))
                .count(),
            domain_with_copyright: fetch.status_ok() && body.to_lowercase().contains('©'),
            nb_redirection: fetch.redirected,
        }
    }

    pub fn entries(&self) -> FeatureEntries {
        use FeatureValue::Float;
        let flag = FeatureValue::flag;
        let count = FeatureValue::count;

        vec![
            ("html", count(self.html)),
            ("nb_hyperlinks", count(self.nb_hyperlinks)),
            ("links_in_tags", count(self.nb_hyperlinks)),
            ("ratio_intHyperlinks", Float(self.ratio_int_hyperlinks)),
            ("ratio_extHyperlinks", Float(self.ratio_ext_hyperlinks)),
            ("ratio_intMedia", Float(self.ratio_int_media)),
            ("ratio_extMedia", Float(self.ratio_ext_media)),
            ("safe_anchor", Float(self.safe_anchor)),
            ("login_form", flag(self.login_form)),
            ("empty_title", flag(self.empty_title)),
            ("nb_extCSS", count(self.nb_ext_css)),
            ("domain_with_copyright", flag(self.domain_with_copyright)),
            ("nb_redirection", flag(self.nb_redirection)),
        ]
    }
}

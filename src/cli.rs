use clap::ValueEnum;

use crate::utils::MediaKind;

/// CLI override for the extension-based media classifier.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum KindArg {
    Auto,
    Audio,
    Video,
}

impl KindArg {
    pub fn resolve(self, url: &str) -> MediaKind {
        match self {
            KindArg::Auto => MediaKind::from_url(url),
            KindArg::Audio => MediaKind::Audio,
            KindArg::Video => MediaKind::Video,
        }
    }
}

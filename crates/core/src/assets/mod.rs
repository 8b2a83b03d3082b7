use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    rules::{Color, Week},
    Result,
};

/// Content variant used within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetSet {
    A,
    B,
}

impl AssetSet {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetSet::A => "A",
            AssetSet::B => "B",
        }
    }
}

/// Image URLs for one pack, keyed by set and color. URLs are already
/// resolved by the asset provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetPack {
    pub id: String,
    #[serde(default)]
    pub images: BTreeMap<AssetSet, BTreeMap<Color, Vec<String>>>,
}

impl AssetPack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            images: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, set: AssetSet, color: Color, url: impl Into<String>) {
        self.images
            .entry(set)
            .or_default()
            .entry(color)
            .or_default()
            .push(url.into());
    }

    /// Builder-style [`AssetPack::register`].
    pub fn with_image(mut self, set: AssetSet, color: Color, url: impl Into<String>) -> Self {
        self.register(set, color, url);
        self
    }

    /// The `nth` image for a coordinate, rotating through the available
    /// list. Empty URLs count as missing.
    pub fn image(&self, set: AssetSet, color: Color, nth: usize) -> Option<&str> {
        let urls = self.images.get(&set)?.get(&color)?;
        if urls.is_empty() {
            return None;
        }
        let url = urls[nth % urls.len()].as_str();
        (!url.is_empty()).then_some(url)
    }

    /// Every distinct non-empty URL referenced by this pack.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.images
            .values()
            .flat_map(|by_color| by_color.values())
            .flatten()
            .map(String::as_str)
            .filter(|url| !url.is_empty())
    }
}

/// All packs a config may draw from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCatalog {
    #[serde(default)]
    pub pack: Option<AssetPack>,
    #[serde(default)]
    pub by_week: BTreeMap<u8, AssetPack>,
    #[serde(default)]
    pub by_month_and_week: BTreeMap<u8, BTreeMap<u8, AssetPack>>,
}

impl AssetCatalog {
    pub fn pack_for(&self, week: Week, month: Option<u8>) -> Option<&AssetPack> {
        get_pack_for_week(
            week,
            self.pack.as_ref(),
            &self.by_week,
            month,
            &self.by_month_and_week,
        )
    }
}

/// Picks the pack for a week: month+week, then week, then the global pack.
/// Week 1 is color-only and never resolves a pack.
pub fn get_pack_for_week<'a>(
    week: Week,
    pack: Option<&'a AssetPack>,
    pack_by_week: &'a BTreeMap<u8, AssetPack>,
    month: Option<u8>,
    pack_by_month_and_week: &'a BTreeMap<u8, BTreeMap<u8, AssetPack>>,
) -> Option<&'a AssetPack> {
    if week == Week::One {
        return None;
    }
    let number = week.number();
    month
        .and_then(|month| pack_by_month_and_week.get(&month))
        .and_then(|by_week| by_week.get(&number))
        .or_else(|| pack_by_week.get(&number))
        .or(pack)
}

/// Storage coordinate of one image in the asset provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCoordinate {
    pub pack_id: String,
    pub month: Option<u8>,
    pub week: Week,
    pub set: AssetSet,
    pub color: Color,
    pub slug: String,
}

impl AssetCoordinate {
    pub fn storage_path(&self) -> String {
        let mut path = format!("think/{}", self.pack_id);
        if let Some(month) = self.month {
            path.push_str(&format!("/m{month:02}"));
        }
        path.push_str(&format!(
            "/w{}/{}/{}/{}",
            self.week.number(),
            self.set.as_str(),
            self.color,
            self.slug
        ));
        path
    }
}

/// Host side of image preloading: fetch and fully decode one URL.
pub trait ImageFetcher {
    fn fetch_and_decode(&mut self, url: &str) -> Result<()>;
}

/// Outcome of a preload pass. Failures are listed, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    pub requested: usize,
    pub loaded: usize,
    pub failed: Vec<String>,
}

impl PreloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn merge(&mut self, other: PreloadReport) {
        self.requested += other.requested;
        self.loaded += other.loaded;
        self.failed.extend(other.failed);
    }
}

pub fn preload_think_pack<F: ImageFetcher>(pack: &AssetPack, fetcher: &mut F) -> PreloadReport {
    preload_urls(pack.urls(), fetcher)
}

pub fn preload_think_pack_by_week<F: ImageFetcher>(
    packs: &BTreeMap<u8, AssetPack>,
    fetcher: &mut F,
) -> PreloadReport {
    preload_urls(packs.values().flat_map(AssetPack::urls), fetcher)
}

pub fn preload_think_pack_by_month<F: ImageFetcher>(
    packs: &BTreeMap<u8, BTreeMap<u8, AssetPack>>,
    fetcher: &mut F,
) -> PreloadReport {
    preload_urls(
        packs
            .values()
            .flat_map(|by_week| by_week.values())
            .flat_map(AssetPack::urls),
        fetcher,
    )
}

/// Preloads only the pack that `week`/`month` would actually resolve to.
pub fn preload_for_config<F: ImageFetcher>(
    catalog: &AssetCatalog,
    week: Week,
    month: Option<u8>,
    fetcher: &mut F,
) -> PreloadReport {
    let mut report = PreloadReport::default();
    if let Some(pack) = catalog.pack_for(week, month) {
        report.merge(preload_think_pack(pack, fetcher));
    }
    report
}

fn preload_urls<'a, F: ImageFetcher>(
    urls: impl Iterator<Item = &'a str>,
    fetcher: &mut F,
) -> PreloadReport {
    let unique: BTreeSet<&str> = urls.collect();
    let mut report = PreloadReport {
        requested: unique.len(),
        ..Default::default()
    };
    for url in unique {
        match fetcher.fetch_and_decode(url) {
            Ok(()) => report.loaded += 1,
            Err(err) => {
                tracing::warn!(url, %err, "image preload failed, falling back to color block");
                report.failed.push(url.to_string());
            }
        }
    }
    tracing::debug!(
        requested = report.requested,
        loaded = report.loaded,
        failed = report.failed.len(),
        "preload finished"
    );
    report
}

// THEORY:
// The `taxonomy` module owns the stimulus library as a three-level tree:
// category -> subcategory -> variant, with every variant leaf owning exactly
// one `FrameSequence`. It is assembled once at startup from whatever the asset
// collaborator discovered on disk and is read-only afterwards.
//
// Key architectural principles:
// 1.  **Assemble Once**: The tree and its companion affordance table are built
//     in a single pass over the collaborator's (already sorted) enumeration.
//     Deterministic input order makes navigation keys stable across runs.
// 2.  **Fail-Soft Resolution**: Resolving a selection path yields either a
//     frame sequence or nothing. A half-valid path is indistinguishable from
//     no selection; it never produces partial garbage or an error.
// 3.  **Precomputed Affordance Table**: Every navigable node contributes one
//     `(key, level, parent)` record at build time. The navigation layer
//     dispatches on exact key matches against this table instead of parsing
//     opaque key strings at runtime.
// 4.  **Implicit Leaf**: A subcategory whose frames sit directly in its own
//     directory (no variant subdirectories) gets the implicit variant key
//     "Video". Implicit leaves are playable but contribute no affordance.

use crate::core_modules::frame_store::{FrameBuffer, FrameSequence, FrameShape, FrameStoreError};
use thiserror::Error;
use tracing::info;

/// Variant key used when a subcategory carries its frames directly.
pub const DEFAULT_VARIANT_KEY: &str = "Video";

/// Navigation depth of a category affordance.
pub const LEVEL_CATEGORY: u8 = 1;
/// Navigation depth of a subcategory affordance.
pub const LEVEL_SUBCATEGORY: u8 = 2;
/// Navigation depth of a variant affordance.
pub const LEVEL_VARIANT: u8 = 3;

/// One navigable node: its key, how deep it sits, and the key of its parent
/// (`None` for top-level categories).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affordance {
    pub key: String,
    pub level: u8,
    pub parent: Option<String>,
}

/// An ordered list of up to three keys addressing a node in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionPath {
    keys: Vec<String>,
}

impl SelectionPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a path from at most three keys; extra leading keys are dropped.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let skip = keys.len().saturating_sub(3);
        Self {
            keys: keys.into_iter().skip(skip).collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Joins the keys with underscores for file stems and log lines.
    pub fn identifier(&self) -> String {
        self.keys.join("_")
    }
}

/// Decoded frames for one variant as handed over by the asset collaborator.
/// `key: None` marks the implicit leaf of a variant-less subcategory.
pub struct VariantAssets {
    pub key: Option<String>,
    pub shape: FrameShape,
    pub frames: Vec<FrameBuffer>,
}

pub struct SubcategoryAssets {
    pub key: String,
    pub variants: Vec<VariantAssets>,
}

pub struct CategoryAssets {
    pub key: String,
    pub subcategories: Vec<SubcategoryAssets>,
}

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("variant '{variant}' under '{category}/{subcategory}': {source}")]
    BadSequence {
        category: String,
        subcategory: String,
        variant: String,
        source: FrameStoreError,
    },
}

/// One level of the stimulus hierarchy. Categories and subcategories own an
/// insertion-ordered list of children; variants own a frame sequence.
pub enum TaxonomyNode {
    Category { children: Vec<(String, TaxonomyNode)> },
    Subcategory { children: Vec<(String, TaxonomyNode)> },
    Variant { sequence: FrameSequence },
}

impl TaxonomyNode {
    fn child(&self, key: &str) -> Option<&TaxonomyNode> {
        match self {
            TaxonomyNode::Category { children } | TaxonomyNode::Subcategory { children } => {
                children.iter().find(|(k, _)| k == key).map(|(_, n)| n)
            }
            TaxonomyNode::Variant { .. } => None,
        }
    }
}

/// The assembled stimulus library plus its navigation affordance table.
pub struct StimulusTaxonomy {
    categories: Vec<(String, TaxonomyNode)>,
    affordances: Vec<Affordance>,
}

impl StimulusTaxonomy {
    /// Builds the tree from the collaborator's enumeration, validating every
    /// frame sequence along the way.
    pub fn assemble(assets: Vec<CategoryAssets>) -> Result<Self, TaxonomyError> {
        let mut categories = Vec::new();
        let mut affordances = Vec::new();

        for category in assets {
            let mut subcategories = Vec::new();
            for subcategory in category.subcategories {
                let mut variants = Vec::new();
                for variant in subcategory.variants {
                    let explicit = variant.key.is_some();
                    let key = variant
                        .key
                        .unwrap_or_else(|| DEFAULT_VARIANT_KEY.to_string());
                    let sequence =
                        FrameSequence::new(variant.shape, variant.frames).map_err(|source| {
                            TaxonomyError::BadSequence {
                                category: category.key.clone(),
                                subcategory: subcategory.key.clone(),
                                variant: key.clone(),
                                source,
                            }
                        })?;
                    if explicit {
                        affordances.push(Affordance {
                            key: key.clone(),
                            level: LEVEL_VARIANT,
                            parent: Some(subcategory.key.clone()),
                        });
                    }
                    variants.push((key, TaxonomyNode::Variant { sequence }));
                }
                affordances.push(Affordance {
                    key: subcategory.key.clone(),
                    level: LEVEL_SUBCATEGORY,
                    parent: Some(category.key.clone()),
                });
                subcategories.push((
                    subcategory.key,
                    TaxonomyNode::Subcategory { children: variants },
                ));
            }
            affordances.push(Affordance {
                key: category.key.clone(),
                level: LEVEL_CATEGORY,
                parent: None,
            });
            categories.push((
                category.key,
                TaxonomyNode::Category {
                    children: subcategories,
                },
            ));
        }

        info!(
            categories = categories.len(),
            affordances = affordances.len(),
            "stimulus taxonomy assembled"
        );
        Ok(Self {
            categories,
            affordances,
        })
    }

    /// The precomputed `(key, level, parent)` table, in discovery order.
    pub fn affordances(&self) -> &[Affordance] {
        &self.affordances
    }

    /// Walks the path through the tree. Any miss at any depth yields `None`.
    pub fn resolve(&self, path: &SelectionPath) -> Option<&FrameSequence> {
        let keys = path.keys();
        if keys.len() != 3 {
            return None;
        }
        let category = self
            .categories
            .iter()
            .find(|(k, _)| k == &keys[0])
            .map(|(_, n)| n)?;
        let subcategory = category.child(&keys[1])?;
        match subcategory.child(&keys[2])? {
            TaxonomyNode::Variant { sequence } => Some(sequence),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn fixture_shape() -> FrameShape {
        FrameShape {
            width: 4,
            height: 4,
        }
    }

    fn frames(count: usize, fill: u8) -> Vec<FrameBuffer> {
        vec![vec![fill; fixture_shape().byte_len()]; count]
    }

    /// Naturalistic/{Catcam/{V1,V2}, Mousecam(implicit)}, Laboratory/Gratings(implicit)
    pub(crate) fn fixture_assets() -> Vec<CategoryAssets> {
        vec![
            CategoryAssets {
                key: "Laboratory".into(),
                subcategories: vec![SubcategoryAssets {
                    key: "Gratings".into(),
                    variants: vec![VariantAssets {
                        key: None,
                        shape: fixture_shape(),
                        frames: frames(3, 10),
                    }],
                }],
            },
            CategoryAssets {
                key: "Naturalistic".into(),
                subcategories: vec![
                    SubcategoryAssets {
                        key: "Catcam".into(),
                        variants: vec![
                            VariantAssets {
                                key: Some("V1".into()),
                                shape: fixture_shape(),
                                frames: frames(11, 20),
                            },
                            VariantAssets {
                                key: Some("V2".into()),
                                shape: fixture_shape(),
                                frames: frames(5, 30),
                            },
                        ],
                    },
                    SubcategoryAssets {
                        key: "Mousecam".into(),
                        variants: vec![VariantAssets {
                            key: None,
                            shape: fixture_shape(),
                            frames: frames(2, 40),
                        }],
                    },
                ],
            },
        ]
    }

    #[test]
    fn resolves_explicit_and_implicit_variants() {
        let taxonomy = StimulusTaxonomy::assemble(fixture_assets()).expect("assembles");
        let explicit = SelectionPath::from_keys(["Naturalistic", "Catcam", "V1"]);
        let seq = taxonomy.resolve(&explicit).expect("explicit variant");
        assert_eq!(seq.total_frames(), 10);

        let implicit = SelectionPath::from_keys(["Laboratory", "Gratings", "Video"]);
        let seq = taxonomy.resolve(&implicit).expect("implicit variant");
        assert_eq!(seq.frame_count(), 3);
    }

    #[test]
    fn resolution_miss_fails_soft() {
        let taxonomy = StimulusTaxonomy::assemble(fixture_assets()).expect("assembles");
        let missing = SelectionPath::from_keys(["Naturalistic", "Catcam", "V9"]);
        assert!(taxonomy.resolve(&missing).is_none());
        let short = SelectionPath::from_keys(["Naturalistic", "Catcam"]);
        assert!(taxonomy.resolve(&short).is_none());
        assert!(taxonomy.resolve(&SelectionPath::new()).is_none());
    }

    #[test]
    fn resolution_is_identity_stable() {
        let taxonomy = StimulusTaxonomy::assemble(fixture_assets()).expect("assembles");
        let path = SelectionPath::from_keys(["Naturalistic", "Catcam", "V2"]);
        let a = taxonomy.resolve(&path).expect("first resolve");
        let b = taxonomy.resolve(&path).expect("second resolve");
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn affordance_table_levels_and_parents() {
        let taxonomy = StimulusTaxonomy::assemble(fixture_assets()).expect("assembles");
        let table = taxonomy.affordances();
        let find = |key: &str| table.iter().find(|a| a.key == key).expect("present");

        assert_eq!(find("Naturalistic").level, LEVEL_CATEGORY);
        assert_eq!(find("Naturalistic").parent, None);
        assert_eq!(find("Catcam").level, LEVEL_SUBCATEGORY);
        assert_eq!(find("Catcam").parent.as_deref(), Some("Naturalistic"));
        assert_eq!(find("V1").level, LEVEL_VARIANT);
        assert_eq!(find("V1").parent.as_deref(), Some("Catcam"));
        // Implicit leaves are playable but never navigable.
        assert!(!table.iter().any(|a| a.key == DEFAULT_VARIANT_KEY));
    }

    #[test]
    fn selection_path_keeps_last_three() {
        let path = SelectionPath::from_keys(["a", "b", "c", "d"]);
        assert_eq!(path.keys(), ["b", "c", "d"]);
        assert_eq!(path.identifier(), "b_c_d");
    }
}

//! Capture orchestrator
//!
//! Iterates viewports and examples strictly in order against the shared
//! browser session, while snapshot persistence runs on spawned tasks that
//! overlap the next example's browser round-trip. All persistence tasks for
//! a viewport join before its outcomes merge into the run result.

use crate::driver::Driver;
use crate::raster;
use crate::store::{Outcome, SnapshotStore};
use crate::{Error, Example, Result, Viewport};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// One viewport and the examples to capture at it, in render order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewportPlan {
    pub viewport: Viewport,
    pub examples: Vec<Example>,
}

/// One recorded `new` or `diff` outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub description: String,
    pub viewport: String,
    /// Max of the old and new heights for diffs; the capture height for new
    /// images. Used downstream for diff rendering layout.
    pub height: u32,
}

/// Aggregated outcomes of a run. `equal` outcomes are dropped, never
/// recorded; entry order is completion order within a viewport pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub new_images: Vec<SnapshotEntry>,
    pub diff_images: Vec<SnapshotEntry>,
}

/// Group enumerated examples under the configured viewports.
///
/// Viewport order follows the configuration; an example with no viewport
/// names defaults to the first configured viewport; viewports no example
/// targets are dropped. Unknown viewport names and duplicate descriptions
/// within one viewport are configuration errors.
pub fn build_plan(viewports: &[Viewport], examples: &[Example]) -> Result<Vec<ViewportPlan>> {
    if viewports.is_empty() {
        return Err(Error::Config(
            "at least one viewport must be configured".to_string(),
        ));
    }

    let known: HashSet<&str> = viewports.iter().map(|v| v.name.as_str()).collect();
    for example in examples {
        for name in &example.viewports {
            if !known.contains(name.as_str()) {
                return Err(Error::Config(format!(
                    "example \"{}\" references unknown viewport \"{}\"",
                    example.description, name
                )));
            }
        }
    }

    let mut plan = Vec::new();
    for (index, viewport) in viewports.iter().enumerate() {
        let targeted: Vec<Example> = examples
            .iter()
            .filter(|e| {
                e.viewports.contains(&viewport.name) || (e.viewports.is_empty() && index == 0)
            })
            .cloned()
            .collect();

        let mut seen = HashSet::new();
        for example in &targeted {
            if !seen.insert(example.description.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate example description \"{}\" in viewport \"{}\"",
                    example.description, viewport.name
                )));
            }
        }

        if !targeted.is_empty() {
            plan.push(ViewportPlan {
                viewport: viewport.clone(),
                examples: targeted,
            });
        }
    }
    Ok(plan)
}

/// Capture every planned example and classify it against the store.
///
/// Renders never overlap on the session; persistence overlaps the next
/// render and joins at each viewport boundary. A render failure aborts the
/// run after the viewport's in-flight persistence has settled, so artifacts
/// for completed examples stay durable.
pub async fn capture_all(
    driver: &Driver,
    plan: &[ViewportPlan],
    store: &Arc<SnapshotStore>,
) -> Result<RunResult> {
    let mut result = RunResult::default();

    for group in plan {
        info!(
            "capturing {} example(s) at {} ({}x{})",
            group.examples.len(),
            group.viewport.name,
            group.viewport.width,
            group.viewport.height
        );
        driver
            .resize_viewport(group.viewport.width, group.viewport.height)
            .await?;

        let mut pending = Vec::new();
        let mut failure = None;
        for example in &group.examples {
            match capture_one(driver, example).await {
                Ok(image) => {
                    let store = Arc::clone(store);
                    let description = example.description.clone();
                    let viewport = group.viewport.name.clone();
                    pending.push(tokio::spawn(async move {
                        let outcome = store
                            .classify_and_persist(&description, &viewport, &image)
                            .await?;
                        Ok::<_, Error>((description, viewport, outcome))
                    }));
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        // Join barrier: settle this viewport's persistence before merging
        // outcomes or surfacing a render failure.
        let joined = futures::future::try_join_all(pending)
            .await
            .map_err(|e| Error::Other(format!("Persistence task failed: {}", e)));

        if let Some(err) = failure {
            return Err(err);
        }
        for item in joined? {
            let (description, viewport, outcome) = item?;
            match outcome {
                Outcome::New { height } => {
                    debug!("new: \"{}\" at {}", description, viewport);
                    result.new_images.push(SnapshotEntry {
                        description,
                        viewport,
                        height,
                    });
                }
                Outcome::Diff { height } => {
                    debug!("diff: \"{}\" at {}", description, viewport);
                    result.diff_images.push(SnapshotEntry {
                        description,
                        viewport,
                        height,
                    });
                }
                Outcome::Equal => {}
            }
        }
    }

    Ok(result)
}

async fn capture_one(driver: &Driver, example: &Example) -> Result<raster::RasterImage> {
    let area = driver.render(&example.description).await?;
    let screenshot = driver.screenshot().await?;
    raster::crop(&screenshot, &area)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewports() -> Vec<Viewport> {
        vec![
            Viewport::new("desktop", 1024, 768).unwrap(),
            Viewport::new("mobile", 375, 667).unwrap(),
        ]
    }

    #[test]
    fn plan_defaults_examples_to_the_first_viewport() {
        let examples = vec![Example::new("a"), Example::new("b")];
        let plan = build_plan(&viewports(), &examples).expect("plan");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].viewport.name, "desktop");
        assert_eq!(plan[0].examples.len(), 2);
    }

    #[test]
    fn plan_preserves_viewport_and_example_order() {
        let examples = vec![
            Example::with_viewports("a", &["mobile"]),
            Example::with_viewports("b", &["desktop", "mobile"]),
            Example::new("c"),
        ];
        let plan = build_plan(&viewports(), &examples).expect("plan");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].viewport.name, "desktop");
        assert_eq!(
            plan[0]
                .examples
                .iter()
                .map(|e| e.description.as_str())
                .collect::<Vec<_>>(),
            vec!["b", "c"]
        );
        assert_eq!(plan[1].viewport.name, "mobile");
        assert_eq!(
            plan[1]
                .examples
                .iter()
                .map(|e| e.description.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn plan_rejects_unknown_viewport_names() {
        let examples = vec![Example::with_viewports("a", &["tablet"])];
        assert!(matches!(
            build_plan(&viewports(), &examples),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn plan_rejects_duplicate_descriptions_per_viewport() {
        let examples = vec![Example::new("a"), Example::new("a")];
        assert!(matches!(
            build_plan(&viewports(), &examples),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn plan_requires_a_viewport() {
        assert!(matches!(
            build_plan(&[], &[Example::new("a")]),
            Err(Error::Config(_))
        ));
    }
}

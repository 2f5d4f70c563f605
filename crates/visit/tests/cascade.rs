//! Parent/child selector behaviour under slow, failing and overlapping
//! fetches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fieldkit_storage::{collections, LocalStore};
use fieldkit_visit::{
    Cascade, CascadeState, CascadeUpdate, ChoiceOption, FieldError, OptionSource,
    StoreOptionSource,
};
use serde_json::json;

/// Options per parent with a per-parent response delay. Unknown parents fail.
#[derive(Default)]
struct Scripted {
    options: HashMap<&'static str, (Duration, Vec<ChoiceOption>)>,
    fetches: AtomicUsize,
}

impl Scripted {
    fn with(mut self, parent: &'static str, delay_ms: u64, labels: &[(&str, &str)]) -> Self {
        let options = labels
            .iter()
            .map(|(id, label)| ChoiceOption::new(*id, *label))
            .collect();
        self.options
            .insert(parent, (Duration::from_millis(delay_ms), options));
        self
    }
}

#[async_trait]
impl OptionSource for Scripted {
    async fn fetch_options(&self, parent_id: &str) -> Result<Vec<ChoiceOption>, FieldError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.options.get(parent_id) {
            Some((delay, options)) => {
                tokio::time::sleep(*delay).await;
                Ok(options.clone())
            }
            None => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(FieldError::NotFound {
                    what: format!("plots of '{parent_id}'"),
                })
            }
        }
    }
}

fn labels(state: &CascadeState) -> Vec<&str> {
    state.child_options.iter().map(|o| o.label.as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn later_selection_wins_over_slower_earlier_fetch() {
    let source = Scripted::default()
        .with("farm-a", 500, &[("a1", "Alpha")])
        .with("farm-b", 50, &[("b2", "Riverside"), ("b1", "hilltop")]);
    let cascade = Cascade::new(source);

    let (a, b) = tokio::join!(cascade.on_parent_selected(Some("farm-a")), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cascade.on_parent_selected(Some("farm-b")).await
    });

    assert_eq!(b.unwrap(), CascadeUpdate::Populated(2));
    assert_eq!(a.unwrap(), CascadeUpdate::Stale);
    let state = cascade.state();
    assert_eq!(state.selected_parent.as_deref(), Some("farm-b"));
    assert_eq!(labels(&state), vec!["hilltop", "Riverside"]);
    assert!(state.child_enabled);
}

#[tokio::test(start_paused = true)]
async fn child_is_cleared_and_disabled_while_fetching() {
    let source = Scripted::default()
        .with("farm-a", 10, &[("a1", "Alpha")])
        .with("farm-b", 200, &[("b1", "Beta")]);
    let cascade = Cascade::new(source);
    cascade.on_parent_selected(Some("farm-a")).await.unwrap();
    assert!(cascade.state().child_enabled);

    let ((), update) = tokio::join!(
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let pending = cascade.state();
            assert_eq!(pending.selected_parent.as_deref(), Some("farm-b"));
            assert!(pending.child_options.is_empty());
            assert!(!pending.child_enabled);
        },
        cascade.on_parent_selected(Some("farm-b")),
    );
    assert_eq!(update.unwrap(), CascadeUpdate::Populated(1));
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_leaves_child_disabled() {
    let source = Scripted::default().with("farm-a", 10, &[("a1", "Alpha")]);
    let cascade = Cascade::new(source);
    cascade.on_parent_selected(Some("farm-a")).await.unwrap();

    let err = cascade
        .on_parent_selected(Some("farm-missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, FieldError::NotFound { .. }));
    let state = cascade.state();
    assert_eq!(state.selected_parent.as_deref(), Some("farm-missing"));
    assert!(state.child_options.is_empty());
    assert!(!state.child_enabled);
}

#[tokio::test(start_paused = true)]
async fn superseded_failure_is_discarded() {
    let source = Scripted::default().with("farm-b", 100, &[("b1", "Beta")]);
    let cascade = Cascade::new(source);

    let (failed, ok) = tokio::join!(cascade.on_parent_selected(Some("farm-missing")), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        cascade.on_parent_selected(Some("farm-b")).await
    });
    assert_eq!(failed.unwrap(), CascadeUpdate::Stale);
    assert_eq!(ok.unwrap(), CascadeUpdate::Populated(1));
}

#[tokio::test]
async fn blank_parent_clears_without_fetching() {
    let source = Scripted::default().with("farm-a", 0, &[("a1", "Alpha")]);
    let cascade = Cascade::new(source);
    cascade.on_parent_selected(Some("farm-a")).await.unwrap();

    assert_eq!(
        cascade.on_parent_selected(Some("   ")).await.unwrap(),
        CascadeUpdate::Cleared
    );
    assert_eq!(cascade.state(), CascadeState::default());
    assert_eq!(
        cascade.on_parent_selected(None).await.unwrap(),
        CascadeUpdate::Cleared
    );
}

#[tokio::test]
async fn empty_option_list_still_enables_child() {
    let source = Scripted::default().with("farm-a", 0, &[]);
    let cascade = Cascade::new(source);
    assert_eq!(
        cascade.on_parent_selected(Some("farm-a")).await.unwrap(),
        CascadeUpdate::Populated(0)
    );
    assert!(cascade.state().child_enabled);
}

#[tokio::test(start_paused = true)]
async fn clear_discards_pending_fetch() {
    let source = Scripted::default().with("farm-a", 100, &[("a1", "Alpha")]);
    let cascade = Cascade::new(source);

    let (update, ()) = tokio::join!(cascade.on_parent_selected(Some("farm-a")), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cascade.clear();
    });
    assert_eq!(update.unwrap(), CascadeUpdate::Stale);
    assert_eq!(cascade.state(), CascadeState::default());
}

#[tokio::test]
async fn instances_on_one_parent_are_independent() {
    let source = Arc::new(
        Scripted::default()
            .with("farm-a", 0, &[("a1", "Alpha")])
            .with("farm-b", 0, &[("b1", "Beta")]),
    );
    let plots = Cascade::new(SharedSource(source.clone()));
    let tasks = Cascade::new(SharedSource(source.clone()));

    plots.on_parent_selected(Some("farm-a")).await.unwrap();
    tasks.on_parent_selected(Some("farm-b")).await.unwrap();
    tasks.clear();

    assert_eq!(labels(&plots.state()), vec!["Alpha"]);
    assert_eq!(tasks.state(), CascadeState::default());
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
}

struct SharedSource(Arc<Scripted>);

#[async_trait]
impl OptionSource for SharedSource {
    async fn fetch_options(&self, parent_id: &str) -> Result<Vec<ChoiceOption>, FieldError> {
        self.0.fetch_options(parent_id).await
    }
}

#[tokio::test]
async fn plots_are_read_from_the_store() {
    let store = LocalStore::new();
    for (id, property, name) in [
        ("p1", "prop-1", "Talhão 2"),
        ("p2", "prop-1", "bananal"),
        ("p3", "prop-2", "Pivô Central"),
        ("p4", "prop-1", "Talhão 1"),
    ] {
        store
            .seed(
                collections::PLOTS,
                id,
                json!({"property_id": property, "name": name})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();
    }

    let cascade = Cascade::new(StoreOptionSource::plots(store));
    assert_eq!(
        cascade.on_parent_selected(Some("prop-1")).await.unwrap(),
        CascadeUpdate::Populated(3)
    );
    let state = cascade.state();
    assert_eq!(labels(&state), vec!["bananal", "Talhão 1", "Talhão 2"]);
    assert_eq!(state.child_options[0], ChoiceOption::new("p2", "bananal"));
}

#[tokio::test]
async fn plot_without_name_is_a_decode_error() {
    let store = LocalStore::new();
    store
        .seed(
            collections::PLOTS,
            "p1",
            json!({"property_id": "prop-1"}).as_object().cloned().unwrap(),
        )
        .unwrap();

    let cascade = Cascade::new(StoreOptionSource::plots(store));
    let err = cascade
        .on_parent_selected(Some("prop-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, FieldError::Store(_)), "{err:?}");
    assert!(!cascade.state().child_enabled);
}

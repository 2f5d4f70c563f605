use fieldkit_visit::{Cascade, CascadeUpdate, StoreOptionSource};

use crate::{emit, Context};

/// Populate the plot selector for `property`, as the visit and task forms do
/// when a property is picked.
pub(crate) async fn cmd_plots(ctx: &Context, property: &str) -> Result<(), String> {
    let store = ctx.open_store()?;
    let cascade = Cascade::new(StoreOptionSource::plots(store));
    let update = cascade
        .on_parent_selected(Some(property))
        .await
        .map_err(|e| e.to_string())?;
    if update == CascadeUpdate::Cleared {
        return Err("a property id is required".to_string());
    }

    let state = cascade.state();
    emit(ctx, &state.child_options, || {
        if state.child_options.is_empty() {
            return format!("no plots for property {}", property);
        }
        state
            .child_options
            .iter()
            .map(|o| format!("{}  {}", o.id, o.label))
            .collect::<Vec<_>>()
            .join("\n")
    });
    Ok(())
}

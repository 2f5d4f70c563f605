use fieldkit_guard::AntiDuplicate;
use fieldkit_visit::activity::{register_activity, ActivityDraft};

use crate::{emit, ActivityCommands, Context};

pub(crate) async fn cmd_activity(ctx: &Context, command: ActivityCommands) -> Result<(), String> {
    let agronomist = ctx.config.agronomist()?;
    let store = ctx.open_store()?;

    match command {
        ActivityCommands::Register { plot, kind, notes } => {
            let draft = ActivityDraft {
                plot_id: plot,
                kind,
                notes,
            };
            let store = &store;
            let submit = AntiDuplicate::new(move |draft: ActivityDraft| async move {
                register_activity(store, agronomist, &draft).await
            });
            let activity = submit
                .call(draft)
                .await
                .ok_or_else(|| "activity submission already in progress".to_string())?
                .map_err(|e| e.to_string())?;
            emit(ctx, &activity, || {
                format!("{} recorded on plot {} ({})", activity.kind, activity.plot_id, activity.id)
            });
        }
    }
    Ok(())
}

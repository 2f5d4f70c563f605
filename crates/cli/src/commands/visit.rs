use std::sync::Arc;

use fieldkit_storage::{LocalStore, ObservationRecord, VisitRecord};
use fieldkit_visit::{
    CheckIn, FieldError, FixedLocation, Observation, VisitController, VisitState,
};
use serde_json::json;

use crate::{emit, Context, StartArgs, VisitCommands};

type Controller = VisitController<Arc<LocalStore>, FixedLocation>;

/// Every visit command starts like a fresh page load: a new controller picks
/// up the visit in progress from the store before acting.
pub(crate) async fn cmd_visit(ctx: &Context, command: VisitCommands) -> Result<(), String> {
    let agronomist = ctx.config.agronomist()?;
    let store = Arc::new(ctx.open_store()?);
    let controller = VisitController::new(store, ctx.location(), agronomist)
        .with_policy(ctx.config.location.policy());

    let recovery = settle(controller.recover().await)?;
    if !recovery.is_consistent() && !ctx.quiet {
        eprintln!(
            "warning: several visits in progress; using {} and ignoring {}",
            recovery
                .visit
                .as_ref()
                .map(|v| v.id.as_str())
                .unwrap_or_default(),
            recovery.duplicates.join(", ")
        );
    }

    match command {
        VisitCommands::Start(args) => start(ctx, &controller, args).await,
        VisitCommands::Observe { text, image } => {
            let observation = Observation {
                text,
                image_ref: image,
            };
            let record = settle(controller.add_observation(observation).await)?;
            emit(ctx, &record, || {
                format!("observation {} added", record.id)
            });
            Ok(())
        }
        VisitCommands::End => {
            let visit = settle(controller.end_visit().await)?;
            emit(ctx, &visit, || {
                format!(
                    "visit {} completed at {}",
                    visit.id,
                    visit.check_out_time.as_deref().unwrap_or("-")
                )
            });
            Ok(())
        }
        VisitCommands::Status => status(ctx, &controller).await,
        VisitCommands::Recover => {
            emit(
                ctx,
                &json!({
                    "visit": &recovery.visit,
                    "duplicates": &recovery.duplicates,
                }),
                || match &recovery.visit {
                    Some(visit) => format!("recovered visit {}", visit.id),
                    None => "no visit in progress".to_string(),
                },
            );
            Ok(())
        }
    }
}

async fn start(ctx: &Context, controller: &Controller, args: StartArgs) -> Result<(), String> {
    let check_in = CheckIn {
        client_name: args.client_name.unwrap_or_else(|| args.client.clone()),
        property_name: args.property_name.unwrap_or_else(|| args.property.clone()),
        client_id: args.client,
        property_id: args.property,
    };
    let visit = match args.at {
        Some(coords) => settle(controller.start_visit(check_in, coords).await)?,
        None => settle(controller.check_in_here(check_in).await)?,
    };
    emit(ctx, &visit, || {
        format!(
            "visit {} started at {} ({})",
            visit.id, visit.property_name, visit.check_in_time
        )
    });
    Ok(())
}

async fn status(ctx: &Context, controller: &Controller) -> Result<(), String> {
    let (visit, observations): (Option<VisitRecord>, Vec<ObservationRecord>) =
        match controller.state() {
            VisitState::Idle => (None, Vec::new()),
            VisitState::InProgress(visit) => {
                let observations = controller.observations().await.map_err(|e| e.to_string())?;
                (Some(visit), observations)
            }
        };

    let status = if visit.is_some() { "in_progress" } else { "idle" };
    let body = json!({
        "status": status,
        "visit": &visit,
        "observations": &observations,
    });
    emit(ctx, &body, || match &visit {
        None => "idle".to_string(),
        Some(visit) => {
            let mut out = format!(
                "in progress: {} at {} / {} since {}",
                visit.id, visit.client_name, visit.property_name, visit.check_in_time
            );
            for obs in &observations {
                let what = obs
                    .text
                    .as_deref()
                    .or(obs.image_ref.as_deref())
                    .unwrap_or_default();
                out.push_str(&format!("\n  {}  {}", obs.timestamp, what));
            }
            out
        }
    });
    Ok(())
}

/// Unwrap a guarded controller call. A dropped call cannot happen in a
/// single-command process, but is reported rather than ignored.
fn settle<T>(outcome: Option<Result<T, FieldError>>) -> Result<T, String> {
    match outcome {
        Some(result) => result.map_err(|e| e.to_string()),
        None => Err("another visit operation is still in progress".to_string()),
    }
}

use fieldkit_guard::AntiDuplicate;
use fieldkit_visit::task::{list_tasks, schedule_task, TaskDraft};

use crate::{emit, Context, TaskCommands};

pub(crate) async fn cmd_task(ctx: &Context, command: TaskCommands) -> Result<(), String> {
    let agronomist = ctx.config.agronomist()?;
    let store = ctx.open_store()?;

    match command {
        TaskCommands::Schedule {
            title,
            due,
            property,
            plot,
            notes,
        } => {
            let draft = TaskDraft {
                title,
                due_date: due,
                property_id: property,
                plot_id: plot,
                notes,
            };
            let store = &store;
            let submit = AntiDuplicate::new(move |draft: TaskDraft| async move {
                schedule_task(store, agronomist, &draft).await
            });
            let task = submit
                .call(draft)
                .await
                .ok_or_else(|| "task submission already in progress".to_string())?
                .map_err(|e| e.to_string())?;
            emit(ctx, &task, || {
                format!("task {} scheduled for {}", task.id, task.due_date)
            });
        }
        TaskCommands::List => {
            let tasks = list_tasks(&store, agronomist)
                .await
                .map_err(|e| e.to_string())?;
            emit(ctx, &tasks, || {
                if tasks.is_empty() {
                    return "no tasks".to_string();
                }
                tasks
                    .iter()
                    .map(|t| {
                        format!(
                            "{}  {}  {}  [{}/{}]",
                            t.due_date, t.status, t.title, t.property_id, t.plot_id
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
    }
    Ok(())
}

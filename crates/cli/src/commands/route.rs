use std::collections::BTreeMap;

use serde_json::json;

use crate::{emit, Context};

pub(crate) fn cmd_route(ctx: &Context, fragment: &str) -> Result<(), String> {
    let router = ctx.config.router.build().map_err(|e| e.to_string())?;
    let mut view: BTreeMap<String, bool> = BTreeMap::new();
    let state = router.apply_route(fragment, &mut view);

    let body = json!({
        "fragment": fragment,
        "active": state.active(),
        "detail": state.detail(),
        "sections": view,
    });
    emit(ctx, &body, || {
        let mut out = match state.detail() {
            Some(detail) => format!("{} ({})", state.active(), detail),
            None => state.active().to_string(),
        };
        for (section, visible) in state.visibility() {
            let mark = if visible { "shown" } else { "hidden" };
            out.push_str(&format!("\n  {:<12} {}", section, mark));
        }
        out
    });
    Ok(())
}

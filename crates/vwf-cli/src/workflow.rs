//! A demo order-fulfillment workflow exercising every composition operator
//! the core provides. Workflow definitions are ordinary Rust code, so there
//! is no config file to parse; rebuilding this list is how a durable
//! cursor is turned back into a runnable `StepList` after a restart.

use serde_json::json;
use vwf_core::{callback_step, conditional, done_step, input_step, retry_step, step, step_group, Workflow};
use vwf_core::{State, StepList, UserRecord};

pub fn order_fulfillment() -> Workflow {
    StepList::of(validate_order())
        + conditional(needs_manual_approval, manual_approval())
        + charge_payment()
        + step_group("fulfill_order", StepList::of(reserve_inventory()) + ship_order())
        + await_delivery_confirmation()
        + send_receipt()
        + done_step("order_fulfilled")
}

fn needs_manual_approval(state: &State) -> bool {
    state.get("total_cents").and_then(|v| v.as_i64()).unwrap_or(0) > 10_000_00
}

fn validate_order() -> vwf_core::Step {
    step("validate_order", |st: State| {
        let total = st
            .get("total_cents")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| anyhow::anyhow!("order is missing total_cents"))?;
        if total <= 0 {
            anyhow::bail!("order total must be positive, got {total}");
        }
        Ok(st)
    })
}

fn manual_approval() -> vwf_core::Step {
    input_step(
        "manual_approval",
        "approval_form",
        "approved_by",
        |mut st: State| {
            st.insert("approved".into(), json!(true));
            Ok(st)
        },
    )
    .with_assignee("billing_team")
}

fn charge_payment() -> vwf_core::Step {
    retry_step("charge_payment", |mut st: State| {
        if st.get("force_payment_failure").and_then(|v| v.as_bool()).unwrap_or(false) {
            anyhow::bail!("payment gateway declined the card");
        }
        st.insert("charged".into(), json!(true));
        Ok(st)
    })
    .with_retry_auth(std::sync::Arc::new(|user: Option<&UserRecord>| {
        user.map(|u| u.roles.iter().any(|r| r == "billing_ops")).unwrap_or(false)
    }))
}

fn reserve_inventory() -> vwf_core::Step {
    step("reserve_inventory", |mut st: State| {
        st.insert("inventory_reserved".into(), json!(true));
        Ok(st)
    })
}

fn ship_order() -> vwf_core::Step {
    step("ship_order", |mut st: State| {
        st.insert("shipped".into(), json!(true));
        Ok(st)
    })
}

fn await_delivery_confirmation() -> vwf_core::Step {
    let notify_carrier = step("notify_carrier", |st: State| Ok(st));
    let confirm_delivery = step("confirm_delivery", |mut st: State| {
        let delivered = st["delivery_confirmation"]["delivered"].as_bool().unwrap_or(false);
        if !delivered {
            anyhow::bail!("delivery was not confirmed");
        }
        st.insert("delivered".into(), json!(delivered));
        Ok(st)
    });
    callback_step(
        "await_delivery_confirmation",
        notify_carrier,
        confirm_delivery,
        Some("delivery_confirmation".to_string()),
        None,
    )
}

fn send_receipt() -> vwf_core::Step {
    step("send_receipt", |mut st: State| {
        st.insert("receipt_sent".into(), json!(true));
        Ok(st)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_fulfillment_has_seven_top_level_steps() {
        assert_eq!(order_fulfillment().len(), 7);
    }
}

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::bootstrap;
use crate::engine::LoanTerms;
use crate::engine::monetary::is_supply_authority;
use crate::model::container::{ContainerItem, ContainerType};
use crate::model::credits::Credits;
use crate::model::event::{ActorRef, AggregateType, EventInput};
use crate::model::intent::{Affordance, ErrorCode, Intent, IntentResult, Outcome};
use crate::model::loan::RepaymentSource;
use crate::model::payload::Payload;
use crate::model::trajectory::TrajectorySpan;

/// The universal operation endpoint: every intent arrives here and leaves
/// as the one `IntentResult` envelope, success or failure.
pub async fn submit_intent(
    State(state): State<AppState>,
    Json(intent): Json<Intent>,
) -> Result<Json<IntentResult>, ApiError> {
    let started = Instant::now();

    if intent.intent.trim().is_empty() {
        return Err(ApiError::missing_intent());
    }

    let actor = intent.actor.clone().unwrap_or(ActorRef::Anonymous);
    state
        .rate_limiter
        .check(&actor.to_string())
        .await
        .map_err(ApiError::rate_limited)?;

    let result = dispatch(&state, &intent, &actor).await?;
    Ok(Json(result.stamped(
        Utc::now().timestamp_millis(),
        started.elapsed().as_millis() as u64,
    )))
}

async fn dispatch(
    state: &AppState,
    intent: &Intent,
    actor: &ActorRef,
) -> Result<IntentResult, ApiError> {
    let ledger = &state.ledger;
    let payload = &intent.payload;

    match intent.intent.as_str() {
        "bootstrap" => {
            let primordial = bootstrap::bootstrap(&ledger.store).await?;
            Ok(IntentResult::ok(
                Outcome::Created {
                    id: primordial.realm_id,
                    entity: "realm".into(),
                },
                Vec::new(),
                vec![
                    Affordance::new("wallet.create", "Create a wallet", &["owner_id"]),
                    Affordance::new(
                        "container.create",
                        "Create a container",
                        &["name", "container_type", "owner_id"],
                    ),
                ],
            ))
        }

        "wallet.create" => {
            let owner_id = str_field(payload, "owner_id")?;
            let wallet_id = opt_str_field(payload, "wallet_id")
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let allow_negative = payload
                .get("allow_negative")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let wallet = ledger
                .monetary
                .create_wallet(&wallet_id, owner_id, allow_negative, actor.clone())
                .await?;
            Ok(IntentResult::ok(
                Outcome::Created {
                    id: wallet.id,
                    entity: "wallet".into(),
                },
                Vec::new(),
                vec![
                    Affordance::new("credits.mint", "Mint credits into this wallet", &[
                        "wallet_id",
                        "amount",
                    ]),
                    Affordance::new("credits.transfer", "Transfer credits", &[
                        "from", "to", "amount",
                    ]),
                ],
            ))
        }

        "credits.mint" => {
            require_supply_authority(actor)?;
            let wallet_id = str_field(payload, "wallet_id")?;
            let amount = credits_field(payload, "amount")?;
            let agreement_id =
                opt_str_field(payload, "agreement_id").unwrap_or(bootstrap::GENESIS_AGREEMENT_ID);
            let event = ledger
                .monetary
                .mint(wallet_id, amount, agreement_id, actor.clone())
                .await?;
            Ok(IntentResult::ok(
                Outcome::Transitioned {
                    id: wallet_id.to_string(),
                    status: "minted".into(),
                },
                vec![event],
                vec![Affordance::new("credits.transfer", "Transfer credits", &[
                    "from", "to", "amount",
                ])],
            ))
        }

        "credits.burn" => {
            require_supply_authority(actor)?;
            let wallet_id = str_field(payload, "wallet_id")?;
            let amount = credits_field(payload, "amount")?;
            let agreement_id =
                opt_str_field(payload, "agreement_id").unwrap_or(bootstrap::GENESIS_AGREEMENT_ID);
            let event = ledger
                .monetary
                .burn(wallet_id, amount, agreement_id, actor.clone())
                .await?;
            Ok(IntentResult::ok(
                Outcome::Transitioned {
                    id: wallet_id.to_string(),
                    status: "burned".into(),
                },
                vec![event],
                Vec::new(),
            ))
        }

        "credits.transfer" => {
            let from = str_field(payload, "from")?;
            let to = str_field(payload, "to")?;
            let amount = credits_field(payload, "amount")?;
            let receipt = ledger
                .monetary
                .transfer(from, to, amount, actor.clone())
                .await?;
            Ok(IntentResult::ok(
                Outcome::Transferred {
                    from: from.to_string(),
                    to: to.to_string(),
                    item_id: "credits".into(),
                    quantity: Some(receipt.gross.millis()),
                },
                receipt.events,
                Vec::new(),
            ))
        }

        "container.create" => {
            let name = str_field(payload, "name")?;
            let container_type: ContainerType = str_field(payload, "container_type")?
                .parse()
                .map_err(ApiError::invalid)?;
            let owner_id = str_field(payload, "owner_id")?;
            let realm = intent
                .realm
                .as_deref()
                .or_else(|| opt_str_field(payload, "realm_id"))
                .unwrap_or(&state.realm_id);
            let parent = opt_str_field(payload, "parent_container_id").map(str::to_string);
            let container = ledger
                .containers
                .create(
                    name,
                    container_type,
                    None,
                    owner_id,
                    realm,
                    parent,
                    actor.clone(),
                )
                .await?;
            Ok(IntentResult::ok(
                Outcome::Created {
                    id: container.id,
                    entity: "container".into(),
                },
                Vec::new(),
                vec![
                    Affordance::new("container.deposit", "Deposit an item", &[
                        "container_id",
                        "item",
                    ]),
                    Affordance::new("container.transfer", "Transfer an item", &[
                        "from", "to", "item_id",
                    ]),
                ],
            ))
        }

        "container.deposit" => {
            let container_id = str_field(payload, "container_id")?;
            let item: ContainerItem = object_field(payload, "item")?;
            let event = ledger
                .containers
                .deposit(container_id, item, actor.clone(), None, None)
                .await?;
            Ok(IntentResult::ok(
                Outcome::Transitioned {
                    id: container_id.to_string(),
                    status: "deposited".into(),
                },
                vec![event],
                Vec::new(),
            ))
        }

        "container.withdraw" => {
            let container_id = str_field(payload, "container_id")?;
            let item_id = str_field(payload, "item_id")?;
            let quantity = payload.get("quantity").and_then(Value::as_i64);
            let reason = opt_str_field(payload, "reason").map(str::to_string);
            let event = ledger
                .containers
                .withdraw(
                    container_id,
                    item_id,
                    quantity,
                    actor.clone(),
                    None,
                    reason,
                    None,
                )
                .await?;
            Ok(IntentResult::ok(
                Outcome::Transitioned {
                    id: container_id.to_string(),
                    status: "withdrawn".into(),
                },
                vec![event],
                Vec::new(),
            ))
        }

        "container.transfer" => {
            let from = str_field(payload, "from")?;
            let to = str_field(payload, "to")?;
            let item_id = str_field(payload, "item_id")?;
            let quantity = payload.get("quantity").and_then(Value::as_i64);
            let agreement_id = opt_str_field(payload, "agreement_id").map(str::to_string);
            let transfer = ledger
                .containers
                .transfer(from, to, item_id, quantity, actor.clone(), agreement_id)
                .await?;
            Ok(IntentResult::ok(
                Outcome::Transferred {
                    from: from.to_string(),
                    to: to.to_string(),
                    item_id: item_id.to_string(),
                    quantity,
                },
                transfer.events,
                Vec::new(),
            ))
        }

        "loan.disburse" => {
            let borrower_id = str_field(payload, "borrower_id")?;
            let principal = credits_field(payload, "principal")?;
            let repayment_rate = f64_field(payload, "repayment_rate")?;
            let interest_rate = payload
                .get("interest_rate")
                .and_then(Value::as_f64)
                .unwrap_or(ledger.monetary.policy().base_interest_rate);
            let grace_period_days = payload
                .get("grace_period_days")
                .and_then(Value::as_i64)
                .unwrap_or(30);
            let wallet = opt_str_field(payload, "wallet_id");
            let guarantor_id = opt_str_field(payload, "guarantor_id").map(str::to_string);
            let loan = ledger
                .loans
                .disburse(
                    borrower_id,
                    LoanTerms {
                        principal,
                        interest_rate,
                        repayment_rate,
                        grace_period_days,
                        guarantor_id,
                    },
                    wallet,
                    actor.clone(),
                )
                .await?;
            Ok(IntentResult::ok(
                Outcome::Created {
                    id: loan.id,
                    entity: "loan".into(),
                },
                Vec::new(),
                vec![Affordance::new("loan.repay", "Repay this loan", &[
                    "loan_id", "amount",
                ])],
            ))
        }

        "loan.starter" => {
            let borrower_id = str_field(payload, "borrower_id")?;
            let wallet = opt_str_field(payload, "wallet_id");
            let loan = ledger
                .loans
                .disburse_starter(borrower_id, wallet, actor.clone())
                .await?;
            Ok(IntentResult::ok(
                Outcome::Created {
                    id: loan.id,
                    entity: "loan".into(),
                },
                Vec::new(),
                vec![Affordance::new("loan.repay", "Repay this loan", &[
                    "loan_id", "amount",
                ])],
            ))
        }

        "loan.repay" => {
            let loan_id = str_field(payload, "loan_id")?;
            let amount = credits_field(payload, "amount")?;
            let source: RepaymentSource = opt_str_field(payload, "source")
                .unwrap_or("manual")
                .parse()
                .map_err(ApiError::invalid)?;
            let wallet = opt_str_field(payload, "wallet_id");
            let loan = ledger
                .loans
                .repay(loan_id, amount, source, wallet, actor.clone())
                .await?;
            Ok(IntentResult::ok(
                Outcome::Transitioned {
                    id: loan_id.to_string(),
                    status: loan.status.to_string(),
                },
                Vec::new(),
                Vec::new(),
            ))
        }

        "loan.accrue" => {
            let loan_id = str_field(payload, "loan_id")?;
            let amount = opt_credits_field(payload, "amount")?;
            let loan = ledger
                .loans
                .accrue_interest(loan_id, amount, actor.clone())
                .await?;
            Ok(IntentResult::ok(
                Outcome::Transitioned {
                    id: loan_id.to_string(),
                    status: loan.status.to_string(),
                },
                Vec::new(),
                Vec::new(),
            ))
        }

        "loan.forgive" => {
            let loan_id = str_field(payload, "loan_id")?;
            let amount = opt_credits_field(payload, "amount")?;
            let reason = str_field(payload, "reason")?;
            let loan = ledger
                .loans
                .forgive(loan_id, amount, reason, actor.clone())
                .await?;
            Ok(IntentResult::ok(
                Outcome::Transitioned {
                    id: loan_id.to_string(),
                    status: loan.status.to_string(),
                },
                Vec::new(),
                Vec::new(),
            ))
        }

        "breaker.trip" => {
            require_system(actor)?;
            let note = str_field(payload, "note")?;
            let metrics = state.monitor.compute().await?.metrics();
            let report = ledger.trip_breaker(note, metrics).await?;
            Ok(IntentResult::ok(
                Outcome::Transitioned {
                    id: "circuit-breaker".into(),
                    status: format!("open: {}", report.reason),
                },
                Vec::new(),
                vec![Affordance::new("breaker.reset", "Reset the breaker", &[
                    "reason",
                ])],
            ))
        }

        "breaker.reset" => {
            require_system(actor)?;
            let reason = str_field(payload, "reason")?;
            let report = ledger.reset_breaker(reason).await?;
            Ok(IntentResult::ok(
                Outcome::Transitioned {
                    id: "circuit-breaker".into(),
                    status: format!("closed after {}ms", report.downtime_ms),
                },
                Vec::new(),
                Vec::new(),
            ))
        }

        "fund.distribute" => {
            require_system(actor)?;
            let affected = affected_field(payload)?;
            let report = ledger.fund.distribute(&affected, actor.clone()).await?;
            Ok(IntentResult::ok(
                Outcome::Transitioned {
                    id: "guarantee-fund".into(),
                    status: format!(
                        "distributed {} at ratio {:.4}",
                        report.total_paid, report.coverage_ratio
                    ),
                },
                Vec::new(),
                Vec::new(),
            ))
        }

        "trajectory.record" => {
            let entity_id = str_field(payload, "entity_id")?;
            let span: TrajectorySpan = object_field(payload, "span")?;
            let event = ledger
                .store
                .append(EventInput::new(
                    AggregateType::Trajectory,
                    entity_id,
                    Payload::TrajectorySpanRecorded { span },
                    actor.clone(),
                ))
                .await?;
            Ok(IntentResult::ok(
                Outcome::Transitioned {
                    id: entity_id.to_string(),
                    status: "recorded".into(),
                },
                vec![event],
                Vec::new(),
            ))
        }

        other => Err(ApiError::unknown_intent(other)),
    }
}

// ── Payload field extraction ────────────────────────────────────────

fn str_field<'a>(payload: &'a Value, key: &str) -> Result<&'a str, ApiError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::invalid(format!("payload is missing `{key}`")))
}

fn opt_str_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn f64_field(payload: &Value, key: &str) -> Result<f64, ApiError> {
    payload
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| ApiError::invalid(format!("payload is missing numeric `{key}`")))
}

/// Amounts arrive as decimal-UBL strings ("99.900") or whole-UBL integers.
fn parse_credits(value: &Value, key: &str) -> Result<Credits, ApiError> {
    match value {
        Value::String(s) => s
            .parse::<Credits>()
            .map_err(|e| ApiError::invalid(format!("`{key}`: {e}"))),
        Value::Number(n) => n
            .as_i64()
            .map(Credits::from_ubl)
            .ok_or_else(|| ApiError::invalid(format!("`{key}` must be a whole UBL amount"))),
        _ => Err(ApiError::invalid(format!(
            "`{key}` must be a decimal string or integer"
        ))),
    }
}

fn credits_field(payload: &Value, key: &str) -> Result<Credits, ApiError> {
    let value = payload
        .get(key)
        .ok_or_else(|| ApiError::invalid(format!("payload is missing `{key}`")))?;
    parse_credits(value, key)
}

fn opt_credits_field(payload: &Value, key: &str) -> Result<Option<Credits>, ApiError> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_credits(value, key).map(Some),
    }
}

fn object_field<T: serde::de::DeserializeOwned>(
    payload: &Value,
    key: &str,
) -> Result<T, ApiError> {
    let value = payload
        .get(key)
        .ok_or_else(|| ApiError::invalid(format!("payload is missing `{key}`")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| ApiError::invalid(format!("`{key}` is malformed: {e}")))
}

fn affected_field(payload: &Value) -> Result<Vec<(String, Credits)>, ApiError> {
    let entries = payload
        .get("affected")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::invalid("payload is missing `affected` array"))?;
    entries
        .iter()
        .map(|entry| {
            let entity_id = str_field(entry, "entity_id")?.to_string();
            let balance = credits_field(entry, "balance")?;
            Ok((entity_id, balance))
        })
        .collect()
}

/// Supply changes require a whitelisted system actor.
fn require_supply_authority(actor: &ActorRef) -> Result<(), ApiError> {
    if is_supply_authority(actor) {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::FORBIDDEN,
            ErrorCode::InsufficientTrust,
            format!("{actor} may not change credit supply"),
        ))
    }
}

fn require_system(actor: &ActorRef) -> Result<(), ApiError> {
    if actor.is_system() {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::FORBIDDEN,
            ErrorCode::InsufficientTrust,
            format!("{actor} may not operate safety controls"),
        ))
    }
}

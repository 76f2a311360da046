//! `mktplan plan` subcommands.

use anyhow::{Context, Result, bail};
use uuid::Uuid;

use mktplan_core::context::AppContext;
use mktplan_core::lifecycle::GateDecision;
use mktplan_core::stores::plans::NewPlan;
use mktplan_data::models::Plan;

use crate::PlanCommands;
use crate::resolve::resolve_id;

fn check_store(ctx: &AppContext) -> Result<()> {
    if let Some(message) = ctx.plans.error() {
        bail!("{message}");
    }
    Ok(())
}

fn resolve_plan(ctx: &AppContext, input: &str) -> Result<Uuid> {
    let ids: Vec<Uuid> = ctx.plans.plans().iter().map(|p| p.id).collect();
    resolve_id(input, &ids).context("unknown plan")
}

fn parse_decision(approve: bool, reject: bool, comments: Option<String>) -> Result<GateDecision> {
    match (approve, reject) {
        (true, false) => Ok(GateDecision::approved(comments)),
        (false, true) => Ok(GateDecision::rejected(comments)),
        _ => bail!("pass exactly one of --approve or --reject"),
    }
}

fn print_plan(ctx: &AppContext, plan: &Plan) {
    println!("Plan: {} ({})", plan.title, plan.id);
    println!("Status: {}", plan.status);
    println!("Description: {}", plan.description);
    println!("Owner: {}", plan.owner_id);
    println!(
        "Review: {} ({}%)",
        plan.review_status, plan.review_progress
    );
    if let Some(comments) = &plan.review_comments {
        println!("Review comments: {comments}");
    }
    println!(
        "Approval: {} ({}%)",
        plan.approval_status, plan.approval_progress
    );
    if let Some(comments) = &plan.approval_comments {
        println!("Approval comments: {comments}");
    }
    println!("Created: {}", plan.created_at.format("%Y-%m-%d %H:%M"));
    println!(
        "Last activity: {}",
        plan.last_activity_at.format("%Y-%m-%d %H:%M")
    );
    println!();

    println!("Activities:");
    for activity in &plan.activities {
        let blocked = if ctx.plans.check_activity_dependencies(plan.id, activity.id) {
            ""
        } else {
            " [blocked]"
        };
        println!(
            "  [{:>2}] {} ({}, {}){}",
            activity.order_index, activity.title, activity.kind, activity.status, blocked
        );
        for subtask in &activity.subtasks {
            println!("       - {} ({})", subtask.title, subtask.status);
        }
    }
}

/// Run a plan subcommand against the loaded context.
pub async fn run_plan_command(command: PlanCommands, ctx: &AppContext) -> Result<()> {
    match command {
        PlanCommands::List => {
            let plans = ctx.plans.plans();
            if plans.is_empty() {
                println!("No plans found.");
                return Ok(());
            }
            println!(
                "{:<38} {:<30} {:<16} {:>10}",
                "ID", "TITLE", "STATUS", "ACTIVITIES"
            );
            println!("{}", "-".repeat(98));
            for plan in &plans {
                println!(
                    "{:<38} {:<30} {:<16} {:>10}",
                    plan.id,
                    plan.title,
                    plan.status.to_string(),
                    plan.activities.len()
                );
            }
        }
        PlanCommands::Show { plan_id } => {
            let id = resolve_plan(ctx, &plan_id)?;
            let plan = ctx
                .plans
                .plan(id)
                .with_context(|| format!("plan {id} not found"))?;
            print_plan(ctx, &plan);
        }
        PlanCommands::Create {
            title,
            description,
            owner,
        } => {
            let owner_id = owner
                .map(|o| Uuid::parse_str(&o).with_context(|| format!("invalid owner id: {o}")))
                .transpose()?
                .unwrap_or_else(Uuid::new_v4);

            let created = ctx
                .plans
                .create_plan(NewPlan {
                    title,
                    description: description.unwrap_or_default(),
                    owner_id,
                    company_id: None,
                    team_members: vec![],
                })
                .await;
            check_store(ctx)?;
            if let Some(plan) = created {
                println!("Created plan {} ({})", plan.title, plan.id);
            }
        }
        PlanCommands::FromTemplate {
            template_id,
            title,
            description,
            owner,
        } => {
            let template_ids: Vec<Uuid> =
                ctx.templates.templates().iter().map(|t| t.id).collect();
            let tid = resolve_id(&template_id, &template_ids).context("unknown template")?;
            let template = ctx
                .templates
                .template(tid)
                .with_context(|| format!("template {tid} not found"))?;
            let activities = ctx.templates.activities(tid);

            let owner_id = owner
                .map(|o| Uuid::parse_str(&o).with_context(|| format!("invalid owner id: {o}")))
                .transpose()?
                .unwrap_or_else(Uuid::new_v4);

            let created = ctx
                .plans
                .create_plan_from_template(
                    NewPlan {
                        title,
                        description: description.unwrap_or_default(),
                        owner_id,
                        company_id: template.company_id,
                        team_members: vec![],
                    },
                    &template,
                    &activities,
                )
                .await;
            check_store(ctx)?;
            if let Some(plan) = created {
                println!(
                    "Created plan {} ({}) with {} activities",
                    plan.title,
                    plan.id,
                    plan.activities.len()
                );
            }
        }
        PlanCommands::SendToReview { plan_id, reviewer } => {
            let id = resolve_plan(ctx, &plan_id)?;
            let reviewer_id = Uuid::parse_str(&reviewer)
                .with_context(|| format!("invalid reviewer id: {reviewer}"))?;
            let updated = ctx.plans.send_to_review(id, reviewer_id).await;
            check_store(ctx)?;
            if let Some(plan) = updated {
                println!("Plan {} is now {}", plan.title, plan.status);
            }
        }
        PlanCommands::Review {
            plan_id,
            approve,
            reject,
            comments,
        } => {
            let id = resolve_plan(ctx, &plan_id)?;
            let decision = parse_decision(approve, reject, comments)?;
            let updated = ctx.plans.review_plan(id, decision).await;
            check_store(ctx)?;
            if let Some(plan) = updated {
                println!(
                    "Plan {} reviewed: now {} (review {}%)",
                    plan.title, plan.status, plan.review_progress
                );
            }
        }
        PlanCommands::SendToApproval { plan_id, approver } => {
            let id = resolve_plan(ctx, &plan_id)?;
            let approver_id = Uuid::parse_str(&approver)
                .with_context(|| format!("invalid approver id: {approver}"))?;
            let updated = ctx.plans.send_to_approval(id, approver_id).await;
            check_store(ctx)?;
            if let Some(plan) = updated {
                println!("Plan {} is awaiting approval", plan.title);
            }
        }
        PlanCommands::Approve {
            plan_id,
            approve,
            reject,
            comments,
        } => {
            let id = resolve_plan(ctx, &plan_id)?;
            let decision = parse_decision(approve, reject, comments)?;
            let updated = ctx.plans.approve_plan(id, decision).await;
            check_store(ctx)?;
            if let Some(plan) = updated {
                println!(
                    "Plan {} decided: now {} (approval {}%)",
                    plan.title, plan.status, plan.approval_progress
                );
            }
        }
        PlanCommands::Activate { plan_id } => {
            let id = resolve_plan(ctx, &plan_id)?;
            let updated = ctx.plans.activate_plan(id).await;
            check_store(ctx)?;
            if let Some(plan) = updated {
                println!("Plan {} is now {}", plan.title, plan.status);
            }
        }
        PlanCommands::Complete { plan_id } => {
            let id = resolve_plan(ctx, &plan_id)?;
            let updated = ctx.plans.complete_plan(id).await;
            check_store(ctx)?;
            if let Some(plan) = updated {
                println!("Plan {} is now {}", plan.title, plan.status);
            }
        }
        PlanCommands::Delete { plan_id } => {
            let id = resolve_plan(ctx, &plan_id)?;
            ctx.plans.delete_plan(id).await;
            check_store(ctx)?;
            println!("Deleted plan {id}.");
        }
    }

    Ok(())
}

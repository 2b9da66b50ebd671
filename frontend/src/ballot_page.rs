use client::{BallotMachine, FailedStep, Phase, ReviewChoice};
use shared::{Choice, Contest};
use tracing::warn;
use yew::prelude::*;
use yew_router::prelude::*;

use crate::styles::*;
use crate::{Route, VoterSession};

#[function_component]
pub fn BallotPage() -> Html {
    let session = use_context::<VoterSession>();
    let Some(session) = session else { return html! {} };
    let machine = session.machine;

    let phase = machine.phase();
    if matches!(phase, Phase::Verifying | Phase::Expired) {
        return html! { <Redirect<Route> to={Route::Verify} /> };
    }

    html! {
        <div class={CONTAINER}>
            {render_header(&machine, phase)}
            {match phase {
                Phase::Loading => html! {
                    <div class="animate-pulse text-blue-400 text-center">{"Loading your ballot..."}</div>
                },
                Phase::Ready => render_contests(&machine),
                Phase::Confirming => render_review(&machine),
                Phase::Submitting => html! {
                    <div class="animate-pulse text-blue-400 text-center">{"Submitting ballot..."}</div>
                },
                Phase::Complete => render_receipt(&machine),
                Phase::Error(step) => render_error(&machine, step),
                Phase::Verifying | Phase::Expired => html! {},
            }}
        </div>
    }
}

fn render_header(machine: &BallotMachine, phase: Phase) -> Html {
    let name = machine.voter().map(|v| v.name).unwrap_or_default();
    let countdown = if machine.is_expiring() { COUNTDOWN_EXPIRING } else { COUNTDOWN_OK };

    let onlogout = {
        let machine = machine.clone();
        Callback::from(move |_: MouseEvent| {
            if let Err(e) = machine.logout() {
                warn!("Logout refused: {}", e);
            }
        })
    };

    html! {
        <div class={combine_classes(FLEX_BETWEEN, "mb-8")}>
            <div>
                <p class={TEXT_MUTED}>{"Voting as"}</p>
                <p class={HEADING_SM}>{name}</p>
            </div>
            {if phase == Phase::Complete {
                html! {}
            } else {
                html! {
                    <div class="flex items-center gap-4">
                        <span class={combine_classes(COUNTDOWN, countdown)}>{machine.remaining_display()}</span>
                        <button
                            type="button"
                            class={button(BUTTON_MUTED)}
                            onclick={onlogout}
                            disabled={phase == Phase::Submitting}
                        >
                            {"Log out"}
                        </button>
                    </div>
                }
            }}
        </div>
    }
}

fn render_contests(machine: &BallotMachine) -> Html {
    let Some(ballot) = machine.ballot() else { return html! {} };

    let onreview = {
        let machine = machine.clone();
        Callback::from(move |_: MouseEvent| {
            // An empty ballot is reported through last_error.
            let _ = machine.request_submission();
        })
    };

    html! {
        <div class={SPACE_Y_LG}>
            {match machine.last_error() {
                Some(error) => html! { <div class={alert_style("error")}>{error.to_string()}</div> },
                None => html! {},
            }}
            {for ballot.contests().iter().map(|contest| render_contest(machine, contest))}
            <button type="button" class={combine_classes(&button(BUTTON_PRIMARY), "w-full py-3")} onclick={onreview}>
                {"Review Ballot"}
            </button>
        </div>
    }
}

fn render_contest(machine: &BallotMachine, contest: &Contest) -> Html {
    let current = machine.selection(contest.id());
    let declined = matches!(current, Some(Choice::Decline));

    let ondecline = {
        let machine = machine.clone();
        let contest_id = contest.id().to_string();
        Callback::from(move |_: MouseEvent| {
            let outcome = if machine.selection(&contest_id) == Some(Choice::Decline) {
                machine.clear_selection(&contest_id)
            } else {
                machine.decline(&contest_id)
            };
            if let Err(e) = outcome {
                warn!("Could not update contest {}: {}", contest_id, e);
            }
        })
    };

    html! {
        <div class={CONTEST_CARD}>
            <h2 class={HEADING_MD}>{contest.portfolio.name.clone()}</h2>
            {match &contest.portfolio.description {
                Some(description) => html! { <p class={TEXT_MUTED}>{description.clone()}</p> },
                None => html! {},
            }}
            <div class="space-y-2">
                {for contest.candidates.iter().map(|candidate| {
                    let selected = matches!(&current, Some(Choice::Candidate(id)) if *id == candidate.id);
                    let onclick = {
                        let machine = machine.clone();
                        let contest_id = contest.id().to_string();
                        let candidate_id = candidate.id.clone();
                        Callback::from(move |_: MouseEvent| {
                            if let Err(e) = machine.select(&contest_id, &candidate_id) {
                                warn!("Could not select {}: {}", candidate_id, e);
                            }
                        })
                    };
                    let label = if contest.is_single_candidate() {
                        format!("Endorse {}", candidate.name)
                    } else {
                        candidate.name.clone()
                    };
                    html! {
                        <button type="button" class={choice(selected, false)} {onclick}>{label}</button>
                    }
                })}
                <button type="button" class={choice(declined, true)} onclick={ondecline}>
                    {if contest.is_single_candidate() { "Do not endorse" } else { "Decline to vote" }}
                </button>
            </div>
        </div>
    }
}

fn render_review(machine: &BallotMachine) -> Html {
    let Some(summary) = machine.summary() else { return html! {} };

    let oncancel = {
        let machine = machine.clone();
        Callback::from(move |_: MouseEvent| {
            let _ = machine.cancel();
        })
    };
    let onconfirm = {
        let machine = machine.clone();
        Callback::from(move |_: MouseEvent| {
            let machine = machine.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let _ = machine.confirm().await;
            });
        })
    };

    html! {
        <div class={SPACE_Y_LG}>
            <h2 class={HEADING_MD}>{"Confirm your choices"}</h2>
            {match machine.last_error() {
                Some(error) => html! { <div class={alert_style("error")}>{error.to_string()}</div> },
                None => html! {},
            }}
            <ul class="space-y-2">
                {for summary.lines.iter().map(|line| html! {
                    <li class={combine_classes(FLEX_BETWEEN, "bg-gray-800 border border-gray-700 p-3 rounded-lg")}>
                        <span class="text-gray-400">{line.contest.clone()}</span>
                        <span class="text-gray-100 font-semibold">
                            {match &line.choice {
                                ReviewChoice::Candidate { name, .. } => name.clone(),
                                ReviewChoice::Declined => "Declined".to_string(),
                            }}
                        </span>
                    </li>
                })}
            </ul>
            <p class={TEXT_MUTED}>
                {format!("{} of {} contests answered, {} declined", summary.lines.len(), summary.contests, summary.declined)}
            </p>
            <div class="flex flex-col sm:flex-row gap-4">
                <button type="button" class={combine_classes(&button(BUTTON_SUCCESS), "flex-1 py-3")} onclick={onconfirm}>
                    {"Submit Ballot"}
                </button>
                <button type="button" class={combine_classes(&button(BUTTON_MUTED), "flex-1 py-3")} onclick={oncancel}>
                    {"Back"}
                </button>
            </div>
        </div>
    }
}

fn render_receipt(machine: &BallotMachine) -> Html {
    let Some(receipt) = machine.receipt() else { return html! {} };

    let ondone = {
        let machine = machine.clone();
        Callback::from(move |_: MouseEvent| {
            if let Err(e) = machine.logout() {
                warn!("Could not leave receipt: {}", e);
            }
        })
    };

    html! {
        <div class={SPACE_Y_LG}>
            <div class="text-center p-6 bg-green-900/50 border border-green-600 rounded-lg">
                <h3 class="text-xl font-semibold mb-2 text-green-400">{"Ballot Cast Successfully!"}</h3>
                <p class="text-gray-300">{receipt.message.clone()}</p>
                <p class="text-gray-300">{format!("Votes recorded: {}", receipt.votes_cast)}</p>
                {if receipt.is_partial() {
                    html! {
                        <div class={alert_style("warning")}>
                            {for receipt.failed_votes.iter().map(|failed| html! { <p>{failed.reason.clone()}</p> })}
                        </div>
                    }
                } else { html! {} }}
            </div>
            <button type="button" class={combine_classes(&button(BUTTON_PRIMARY), "w-full py-3")} onclick={ondone}>
                {"Done"}
            </button>
        </div>
    }
}

fn render_error(machine: &BallotMachine, step: FailedStep) -> Html {
    let message = machine.last_error().map(|e| e.to_string()).unwrap_or_default();

    let onretry = {
        let machine = machine.clone();
        Callback::from(move |_: MouseEvent| {
            let machine = machine.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let _ = machine.retry().await;
            });
        })
    };
    let onback = {
        let machine = machine.clone();
        Callback::from(move |_: MouseEvent| {
            let _ = machine.cancel();
        })
    };

    html! {
        <div class={SPACE_Y_LG}>
            <div class="text-center p-6 bg-red-900/50 border border-red-600 rounded-lg">
                <p class="text-red-200">{message}</p>
            </div>
            <div class="flex flex-col sm:flex-row gap-4">
                <button type="button" class={combine_classes(&button(BUTTON_PRIMARY), "flex-1 py-3")} onclick={onretry}>
                    {if step == FailedStep::Loading { "Reload Ballot" } else { "Try Again" }}
                </button>
                {if step == FailedStep::Submission {
                    html! {
                        <button type="button" class={combine_classes(&button(BUTTON_DANGER), "flex-1 py-3")} onclick={onback}>
                            {"Change Selections"}
                        </button>
                    }
                } else { html! {} }}
            </div>
        </div>
    }
}

use client::Phase;
use shared::VOTER_TOKEN_LENGTH;
use web_sys::HtmlInputElement;
use yew::prelude::*;
use yew_router::prelude::*;

use crate::styles::*;
use crate::{Route, VoterSession};

#[function_component]
pub fn VerifyPage() -> Html {
    let session = use_context::<VoterSession>();
    let token = use_state(String::new);

    let Some(session) = session else { return html! {} };
    let machine = session.machine.clone();

    let phase = machine.phase();
    if !matches!(phase, Phase::Verifying | Phase::Expired) {
        return html! { <Redirect<Route> to={Route::Ballot} /> };
    }

    let oninput = {
        let token = token.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            token.set(input.value());
        })
    };

    let onsubmit = {
        let token = token.clone();
        let machine = machine.clone();
        Callback::from(move |e: SubmitEvent| {
            e.prevent_default();
            let machine = machine.clone();
            let raw = (*token).clone();
            wasm_bindgen_futures::spawn_local(async move {
                // Failures are recorded on the machine and rendered below.
                let _ = machine.verify(&raw, None).await;
            });
        })
    };

    let verifying = machine.is_verifying();
    let expired = phase == Phase::Expired;
    let error = machine.visible_error();

    html! {
        <div class={CARD}>
            <h1 class={HEADING_LG}>{"Cast Your Vote"}</h1>

            {if expired {
                html! { <div class={alert_style("warning")}>{"Your session has ended. Enter your token to continue."}</div> }
            } else { html! {} }}

            {match error {
                Some(error) => html! { <div class={alert_style("error")}>{error.to_string()}</div> },
                None => html! {},
            }}

            <form {onsubmit} class={SPACE_Y_LG}>
                <label class={TEXT_LABEL} for="voter-token">
                    {format!("Voting token ({} characters)", VOTER_TOKEN_LENGTH)}
                </label>
                <input
                    id="voter-token"
                    class={INPUT_TOKEN}
                    autocomplete="off"
                    value={(*token).clone()}
                    {oninput}
                    disabled={verifying}
                />
                <button type="submit" class={combine_classes(&button(BUTTON_PRIMARY), "w-full py-3")} disabled={verifying}>
                    {if verifying { "Verifying..." } else { "Continue" }}
                </button>
            </form>
        </div>
    }
}

use std::rc::Rc;

use client::{BallotMachine, Session};
use tracing::{info, warn};
use yew::prelude::*;
use yew_router::prelude::*;

mod ballot_page;
mod browser;
mod config;
mod logging;
mod styles;
mod verify_page;

use crate::{
    ballot_page::BallotPage,
    browser::{BrowserPlatform, FetchTransport, SessionStorage},
    config::CONFIG,
    verify_page::VerifyPage,
};

#[derive(Clone, Routable, PartialEq)]
pub enum Route {
    #[at("/")] Verify,
    #[at("/ballot")] Ballot,
    #[not_found]
    #[at("/404")] NotFound,
}

/// Shared with every page. Compares by version so consumers re-render
/// whenever the machine reports a change.
#[derive(Clone)]
pub struct VoterSession {
    pub machine: BallotMachine,
    version: u64,
}

impl PartialEq for VoterSession {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

#[derive(Default)]
struct Version(u64);

impl Reducible for Version {
    type Action = ();

    fn reduce(self: Rc<Self>, _: ()) -> Rc<Self> {
        Rc::new(Version(self.0 + 1))
    }
}

fn build_machine() -> BallotMachine {
    let session = Session::new(
        CONFIG.client(),
        Rc::new(BrowserPlatform),
        Rc::new(FetchTransport),
        Rc::new(SessionStorage),
    );
    BallotMachine::new(session)
}

#[function_component(App)]
fn app() -> Html {
    let machine = use_state(build_machine);
    let version = use_reducer(Version::default);

    use_effect_with_deps({
        let machine = (*machine).clone();
        let dispatcher = version.dispatcher();
        move |_| {
            machine.set_listener(move || dispatcher.dispatch(()));
            wasm_bindgen_futures::spawn_local(async move {
                match machine.resume().await {
                    Ok(true) => info!("Resumed session from this tab"),
                    Ok(false) => {}
                    Err(e) => warn!("Could not resume session: {}", e),
                }
            });
            || ()
        }
    }, ());

    let context = VoterSession { machine: (*machine).clone(), version: version.0 };

    html! {
        <ContextProvider<VoterSession> {context}>
            <BrowserRouter>
                <div class="min-h-screen bg-gray-900">
                    <Switch<Route> render={switch} />
                </div>
            </BrowserRouter>
        </ContextProvider<VoterSession>>
    }
}

fn switch(routes: Route) -> Html {
    match routes {
        Route::Verify => html! { <VerifyPage /> },
        Route::Ballot => html! { <BallotPage /> },
        Route::NotFound => html! { <Redirect<Route> to={Route::Verify} /> },
    }
}

fn main() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
    logging::init();
    yew::Renderer::<App>::new().render();
}

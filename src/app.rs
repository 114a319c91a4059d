use crate::client::Client;
use crate::conversation::Conversation;
use crate::location::BrowserLocation;
use crate::login::Login;
use crate::nav::Nav;
use crate::supabase::Supabase;
use futures::future::LocalBoxFuture;
use leptos::logging::log;
use leptos::*;
use std::rc::Rc;

pub type AppClient = Client<Supabase, BrowserLocation>;

#[component]
pub fn App(backend: Rc<Supabase>) -> impl IntoView {
    let trigger = create_trigger();
    let client = Client::new(
        backend.clone(),
        Rc::new(BrowserLocation),
        Rc::new(|future: LocalBoxFuture<'static, ()>| spawn_local(future)),
        Rc::new(move || trigger.notify()),
    );
    client.start();
    {
        let client = client.clone();
        let backend = backend.clone();
        on_cleanup(move || {
            log!("Tearing down realtime channels");
            client.dispose();
            backend.dispose();
        });
    }

    // Only identity changes swap the layout.
    let session = {
        let client = client.clone();
        create_memo(move |_| {
            trigger.track();
            client.with(|chat| chat.session().cloned())
        })
    };

    view! {
        <div class="flex flex-row">
            {move || match session.get() {
                Some(session) => {
                    view! {
                        <Nav client=client.clone() trigger email=session.user.email />
                        <Conversation client=client.clone() trigger />
                    }
                        .into_view()
                }
                None => view! { <Login backend=backend.clone() /> }.into_view(),
            }}
        </div>
    }
}

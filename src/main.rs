mod app;
mod backend;
mod chat;
mod client;
mod config;
mod conversation;
mod error;
#[cfg(test)]
mod fake;
mod format;
mod location;
mod login;
mod message;
mod nav;
mod state;
mod supabase;

use app::*;
use config::Config;
use leptos::logging::error;
use leptos::*;
use std::rc::Rc;
use supabase::Supabase;

fn main() {
    console_error_panic_hook::set_once();
    match Config::from_env().and_then(|config| Supabase::connect(&config)) {
        Ok(backend) => {
            let backend = Rc::new(backend);
            mount_to_body(move || {
                view! { <App backend /> }
            })
        }
        Err(err) => {
            error!("Could not start the chat: {err}");
            mount_to_body(move || {
                view! { <p class="text-red-500 p-4">{format!("Could not start the chat: {err}")}</p> }
            })
        }
    }
}

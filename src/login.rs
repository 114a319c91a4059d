use crate::backend::Backend;
use crate::error::Error;
use crate::state::Credentials;
use crate::supabase::Supabase;
use leptos::logging::log;
use leptos::*;
use std::rc::Rc;

pub const SIGNUP_NOTICE: &str = "Signup successful! Check your email to verify.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Login,
    Signup,
}

/// Status line of the auth form. A successful login leaves it idle, the
/// app switches views once the session arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    Idle,
    Submitting,
    Notice(String),
    Failed(String),
}

impl AuthStatus {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Notice(text) | Self::Failed(text) => Some(text),
            Self::Idle | Self::Submitting => None,
        }
    }
}

pub async fn authenticate<B: Backend>(
    backend: &B,
    action: AuthAction,
    credentials: Credentials,
) -> AuthStatus {
    if credentials.email.is_empty() || credentials.password.is_empty() {
        return AuthStatus::Failed(Error::MissingCredentials.to_string());
    }
    let result = match action {
        AuthAction::Login => backend.sign_in(&credentials).await,
        AuthAction::Signup => backend.sign_up(&credentials).await,
    };
    match (action, result) {
        (_, Err(err)) => AuthStatus::Failed(err.to_string()),
        (AuthAction::Login, Ok(())) => AuthStatus::Idle,
        (AuthAction::Signup, Ok(())) => AuthStatus::Notice(SIGNUP_NOTICE.to_string()),
    }
}

#[component]
pub fn Login(backend: Rc<Supabase>) -> impl IntoView {
    let (email, set_email) = create_signal(String::new());
    let (password, set_password) = create_signal(String::new());
    let (status, set_status) = create_signal(AuthStatus::Idle);

    let submit = move |action: AuthAction| {
        let backend = backend.clone();
        let credentials = Credentials {
            email: email.get_untracked(),
            password: password.get_untracked(),
        };
        set_status.set(AuthStatus::Submitting);
        spawn_local(async move {
            let status = authenticate(backend.as_ref(), action, credentials).await;
            log!("Auth {action:?} -> {status:?}");
            // The form is gone once the session switches the view.
            let _ = set_status.try_set(status);
        });
    };
    let login = {
        let submit = submit.clone();
        move |_| submit(AuthAction::Login)
    };
    let signup = move |_| submit(AuthAction::Signup);
    let submitting = move || status.get() == AuthStatus::Submitting;

    view! {
        <div class="flex items-center justify-center w-screen h-screen bg-gray-100">
            <div class="bg-white p-6 rounded-lg shadow-lg w-[350px] text-center">
                <h3 class="text-xl font-semibold mb-4">"Login / Signup"</h3>
                <input
                    type="email"
                    placeholder="Email"
                    class="w-[90%] border border-gray-300 rounded px-3 py-2 mb-3 focus:outline-none focus:ring-2 focus:ring-blue-400"
                    on:input=move |ev| set_email.set(event_target_value(&ev))
                    prop:value=email
                />
                <input
                    type="password"
                    placeholder="Password"
                    class="w-[90%] border border-gray-300 rounded px-3 py-2 mb-3 focus:outline-none focus:ring-2 focus:ring-blue-400"
                    on:input=move |ev| set_password.set(event_target_value(&ev))
                    prop:value=password
                />
                <button
                    type="button"
                    class="w-[90%] bg-blue-500 text-white rounded px-3 py-2 mb-2 hover:bg-blue-600"
                    disabled=submitting
                    on:click=login
                >
                    Login
                </button>
                <button
                    type="button"
                    class="w-[90%] bg-green-500 text-white rounded px-3 py-2 hover:bg-green-600"
                    disabled=submitting
                    on:click=signup
                >
                    Signup
                </button>
                {move || {
                    status
                        .get()
                        .text()
                        .map(|text| {
                            view! { <p class="text-red-500 mt-2">{text.to_string()}</p> }
                        })
                }}
            </div>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBackend;
    use futures::executor::block_on;

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_requires_both_fields() {
        let backend = FakeBackend::default();
        let status = block_on(authenticate(&backend, AuthAction::Login, credentials("", "pw")));
        assert_eq!(status, AuthStatus::Failed("Email and password are required".to_string()));
    }

    #[test]
    fn test_login_error_is_verbatim() {
        let mut backend = FakeBackend::default();
        backend.sign_in_error = Some("Invalid login credentials".to_string());
        let status = block_on(authenticate(
            &backend,
            AuthAction::Login,
            credentials("a@example.com", "wrong"),
        ));
        assert_eq!(status.text(), Some("Invalid login credentials"));
    }

    #[test]
    fn test_login_and_signup_success() {
        let backend = FakeBackend::default();
        let status = block_on(authenticate(
            &backend,
            AuthAction::Login,
            credentials("a@example.com", "pw"),
        ));
        assert_eq!(status, AuthStatus::Idle);
        let status = block_on(authenticate(
            &backend,
            AuthAction::Signup,
            credentials("new@example.com", "pw"),
        ));
        assert_eq!(status.text(), Some(SIGNUP_NOTICE));
    }

    #[test]
    fn test_signup_failure() {
        let backend = FakeBackend::with_users(&["taken"]);
        let status = block_on(authenticate(
            &backend,
            AuthAction::Signup,
            credentials("taken@example.com", "pw"),
        ));
        assert_eq!(status, AuthStatus::Failed("User already registered".to_string()));
    }
}

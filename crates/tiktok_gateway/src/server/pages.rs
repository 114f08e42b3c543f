//! Server-rendered pages
//!
//! Home is public. Everything else needs a session with an access token and
//! redirects to `/` otherwise.

use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;
use tracing::warn;

use super::{authenticated, current_profile, found, AppState, Authenticated};
use crate::platform::Profile;
use crate::registry::Listing;

const STYLE: &str = r#"
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
            margin: 0;
            background: linear-gradient(135deg, #25f4ee 0%, #fe2c55 100%);
        }
        .container {
            background: white;
            padding: 3rem;
            border-radius: 1rem;
            box-shadow: 0 20px 60px rgba(0,0,0,0.3);
            max-width: 560px;
            text-align: center;
        }
        h1 { color: #161823; margin-bottom: 1rem; }
        .button {
            display: inline-block;
            margin-top: 1rem;
            background: #fe2c55;
            color: white;
            text-decoration: none;
            padding: 0.75rem 2rem;
            border-radius: 0.5rem;
        }
        .button.secondary { background: #161823; }
        .avatar { width: 96px; height: 96px; border-radius: 50%; }
        .muted { color: #666; }
        ul.tools, ul.listings { text-align: left; }
"#;

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <div class="container">
{body}
    </div>
</body>
</html>
"#,
        title = escape_html(title),
    ))
}

/// Minimal HTML escaping for text and attribute values.
pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Session lookup for pages: any failure renders as signed out.
async fn page_session(state: &AppState, jar: &SignedCookieJar) -> Option<Authenticated> {
    match authenticated(state, jar).await {
        Ok(auth) => auth,
        Err(e) => {
            warn!(error = %e, "session lookup failed, rendering signed out");
            None
        }
    }
}

/// Profile for display; a failed fetch renders the page without it.
async fn best_effort_profile(state: &AppState, auth: &Authenticated) -> Option<Profile> {
    match current_profile(state, auth).await {
        Ok(profile) => Some(profile),
        Err(e) => {
            warn!(error = %e, "profile unavailable for page");
            None
        }
    }
}

fn profile_card(profile: Option<&Profile>) -> String {
    let Some(profile) = profile else {
        return r#"        <p class="muted">Signed in with TikTok. Profile details are unavailable right now.</p>"#
            .to_string();
    };

    let avatar = profile
        .avatar_url
        .as_deref()
        .map(|url| {
            format!(
                r#"        <img class="avatar" src="{}" alt="avatar">
"#,
                escape_html(url)
            )
        })
        .unwrap_or_default();
    let username = profile
        .username
        .as_deref()
        .map(|name| format!(r#"        <p class="muted">@{}</p>"#, escape_html(name)))
        .unwrap_or_default();

    format!(
        "{avatar}        <h1>{}</h1>\n{username}",
        escape_html(profile.label())
    )
}

/// `GET /`
pub async fn home(State(state): State<AppState>, jar: SignedCookieJar) -> Html<String> {
    let signed_in = page_session(&state, &jar).await.is_some();

    let action = if signed_in {
        r#"        <a class="button" href="/dashboard">Go to dashboard</a>
        <a class="button secondary" href="/logout">Log out</a>"#
    } else {
        r#"        <a class="button" href="/login">Log in with TikTok</a>"#
    };

    layout(
        "ShweChat",
        &format!(
            r#"        <h1>ShweChat TikTok Login</h1>
        <p class="muted">Connect your TikTok account to use the ShweChat tools.</p>
{action}
        <p class="muted"><a href="/static/terms.html">Terms</a> · <a href="/static/privacy.html">Privacy</a></p>"#
        ),
    )
}

/// `GET /dashboard`
pub async fn dashboard(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    let Some(auth) = page_session(&state, &jar).await else {
        return found("/");
    };
    let profile = best_effort_profile(&state, &auth).await;

    layout(
        "Dashboard",
        &format!(
            r#"{card}
        <ul class="tools">
            <li><a href="/service/real-estate">Real estate</a></li>
            <li><a href="/api/videos">My videos (JSON)</a></li>
            <li><a href="/api/me">My profile (JSON)</a></li>
        </ul>
        <a class="button secondary" href="/logout">Log out</a>"#,
            card = profile_card(profile.as_ref()),
        ),
    )
    .into_response()
}

/// `GET /service/real-estate`
pub async fn real_estate(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    let Some(auth) = page_session(&state, &jar).await else {
        return found("/");
    };
    let profile = best_effort_profile(&state, &auth).await;

    layout(
        "Real estate",
        &format!(
            r#"{card}
        <h2>Real estate</h2>
        <p class="muted">Manage the properties you advertise on TikTok.</p>
        <a class="button" href="/service/real-estate/listings">My listings</a>
        <a class="button secondary" href="/dashboard">Back</a>"#,
            card = profile_card(profile.as_ref()),
        ),
    )
    .into_response()
}

/// `GET /service/real-estate/listings`
pub async fn real_estate_listings(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    let Some(auth) = page_session(&state, &jar).await else {
        return found("/");
    };
    let profile = best_effort_profile(&state, &auth).await;

    let owner_id = profile
        .as_ref()
        .map(|p| p.open_id.clone())
        .or_else(|| auth.data.open_id.clone());

    let listings = match (&state.listings, owner_id) {
        (Some(store), Some(owner_id)) => match store.listings_for(&owner_id).await {
            Ok(listings) => listings,
            Err(e) => {
                warn!(error = %e, "listing lookup failed");
                Vec::new()
            }
        },
        _ => Vec::new(),
    };

    layout(
        "My listings",
        &format!(
            r#"{card}
        <h2>My listings</h2>
{items}
        <a class="button secondary" href="/service/real-estate">Back</a>"#,
            card = profile_card(profile.as_ref()),
            items = listing_items(&listings),
        ),
    )
    .into_response()
}

fn listing_items(listings: &[Listing]) -> String {
    if listings.is_empty() {
        return r#"        <p class="muted">No listings yet.</p>"#.to_string();
    }

    let rows: Vec<String> = listings
        .iter()
        .map(|listing| {
            let title = listing
                .title
                .as_deref()
                .map(escape_html)
                .or_else(|| {
                    listing
                        .id
                        .as_ref()
                        .map(|id| format!("Listing {}", escape_html(&id.to_string())))
                })
                .unwrap_or_else(|| "Untitled listing".to_string());
            let address = listing
                .address
                .as_deref()
                .map(|a| format!(" · {}", escape_html(a)))
                .unwrap_or_default();
            let price = listing
                .price
                .map(|p| format!(" · {p:.2}"))
                .unwrap_or_default();
            format!("            <li>{title}{address}{price}</li>")
        })
        .collect();

    format!("        <ul class=\"listings\">\n{}\n        </ul>", rows.join("\n"))
}

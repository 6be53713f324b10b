//! Walks a browser through a protected form: render it, submit it, then
//! replay the same submission after the token has rotated.
//!
//! Run with `FORMGUARD_DEBUG=1 cargo run --example csrf_form` to see the
//! guard's own log lines.

use formguard::prelude::*;
use std::sync::Arc;

fn form_page(guard: &CsrfGuard<MemorySessionStore>, token: &CsrfToken) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>New Post</title>
    {meta}
</head>
<body>
    <form method="post" action="/posts">
        {field}
        <input type="text" name="title" placeholder="Title" />
        <button type="submit">Publish</button>
    </form>
</body>
</html>"#,
        meta = guard.meta_tags(token).to_html(),
        field = guard.embed(token).to_html(),
    )
}

fn app_handler(guard: CsrfGuard<MemorySessionStore>) -> HandlerFn {
    handler(move |req: HttpRequest| {
        let guard = guard.clone();
        async move {
            match (req.method.as_str(), req.path.as_str()) {
                ("GET", "/posts/new") => {
                    let token = request_token(&req)
                        .cloned()
                        .ok_or_else(|| Error::Internal("no token on request".to_string()))?;
                    Ok(HttpResponse::ok().with_html(form_page(&guard, &token)))
                }
                ("POST", "/posts") => {
                    let form = req.form()?;
                    let title = form.get("title").cloned().unwrap_or_default();
                    Ok(HttpResponse::see_other("/posts/1").with_body(format!("created {}", title)))
                }
                _ => Err(Error::NotFound(req.path.clone())),
            }
        }
    })
}

fn extract_token(html: &str) -> Option<String> {
    let marker = "name=\"authenticity_token\" value=\"";
    let start = html.find(marker)? + marker.len();
    let end = start + html[start..].find('"')?;
    Some(html[start..end].to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    formguard::formguard_log::init();

    let store = Arc::new(MemorySessionStore::default());
    let _reaper = store.spawn_reaper(std::time::Duration::from_secs(60));

    let config = CsrfConfig::from_env()?
        .with_rotation(RotationPolicy::PerVerification)
        .with_cookie_secure(false);
    let guard = CsrfGuard::new(config, store)?;

    let mut chain = MiddlewareChain::new();
    chain.use_middleware(CsrfMiddleware::new(guard.clone()));

    println!("GET /posts/new");
    let page = chain
        .respond(HttpRequest::new("GET", "/posts/new"), app_handler(guard.clone()))
        .await;
    let cookie = page
        .cookies
        .first()
        .and_then(|c| c.split(';').next())
        .map(str::to_string)
        .ok_or("no session cookie was set")?;
    let token = extract_token(&page.text()).ok_or("no hidden field in the form")?;
    println!("  -> {} with session cookie {}", page.status, cookie);

    let submit = |token: &str| {
        HttpRequest::new("POST", "/posts")
            .with_header("Cookie", cookie.as_str())
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(format!("authenticity_token={}&title=Hello", token))
    };

    println!("POST /posts with the embedded token");
    let accepted = chain.respond(submit(&token), app_handler(guard.clone())).await;
    println!("  -> {} {}", accepted.status, accepted.text());

    println!("POST /posts again with the same token");
    let replayed = chain.respond(submit(&token), app_handler(guard.clone())).await;
    println!("  -> {} {}", replayed.status, replayed.text());

    println!("POST /posts without a token");
    let missing = chain.respond(submit(""), app_handler(guard)).await;
    println!("  -> {} {}", missing.status, missing.text());

    Ok(())
}

//! Email bodies for every `EmailType`. Pure: no I/O, no clock reads.

use chrono::{DateTime, Utc};
use serde_json::Value;
use url::Url;

use crate::config::Branding;
use crate::format::{format_currency, format_datetime, html_escape, parse_deadline, time_remaining};

use super::{EmailType, RenderedEmail};

/// Renderer input that does not come from the request itself.
pub struct RenderContext<'a> {
    pub branding: &'a Branding,
    pub now: DateTime<Utc>,
}

/// Type-specific content, laid out identically as HTML and plain text.
struct Content {
    subject: String,
    heading: String,
    greeting: String,
    paragraphs: Vec<String>,
    facts: Vec<(&'static str, String)>,
    action: Option<(&'static str, String)>,
    footnote: Option<String>,
}

pub fn render(
    email_type: EmailType,
    to: &str,
    data: &Value,
    subject_override: Option<&str>,
    ctx: &RenderContext,
) -> RenderedEmail {
    let content = match email_type {
        EmailType::Verification => verification(data, ctx),
        EmailType::Welcome => welcome(data, ctx),
        EmailType::PasswordReset => password_reset(data, ctx),
        EmailType::WagerInvitation => wager_invitation(data, ctx),
        EmailType::WagerJoined => wager_joined(data, ctx),
        EmailType::WagerSettlement => wager_settlement(data, ctx),
        EmailType::QuizInvitation => quiz_invitation(data, ctx),
        EmailType::QuizSettlement => quiz_settlement(data, ctx),
        EmailType::BalanceUpdate => balance_update(data, ctx),
    };

    let subject = subject_override
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| content.subject.clone());

    RenderedEmail {
        to: to.to_string(),
        html: layout_html(&subject, &content, ctx.branding),
        text: layout_text(&content, ctx.branding),
        subject,
    }
}

// ── Data access ────────────────────────────────────────

/// First present key, as a string. Numbers are accepted so ids can be either.
fn text_field(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match data.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn amount_field(data: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match data.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn money(data: &Value, keys: &[&str], ctx: &RenderContext) -> Option<String> {
    let currency = text_field(data, &["currency"]).unwrap_or_else(|| ctx.branding.currency.clone());
    amount_field(data, keys).map(|amount| format_currency(amount, &currency))
}

/// `<app_url>/<path>` with optional query pairs, properly encoded.
fn app_link(branding: &Branding, path: &str, query: &[(&str, &str)]) -> String {
    let base = format!("{}/", branding.app_url.trim_end_matches('/'));
    match Url::parse(&base).and_then(|u| u.join(path.trim_start_matches('/'))) {
        Ok(mut url) => {
            if !query.is_empty() {
                url.query_pairs_mut().extend_pairs(query);
            }
            url.to_string()
        }
        Err(_) => format!("{}{}", base, path.trim_start_matches('/')),
    }
}

fn greeting(data: &Value) -> String {
    match text_field(data, &["name", "username", "displayName"]) {
        Some(name) => format!("Hi {},", name),
        None => "Hi there,".to_string(),
    }
}

/// Explicit URL from the caller, else one built from a token.
fn link_or_token(data: &Value, url_key: &str, path: &str, branding: &Branding) -> Option<String> {
    text_field(data, &[url_key]).or_else(|| {
        text_field(data, &["token"]).map(|token| app_link(branding, path, &[("token", &token)]))
    })
}

fn deadline_facts(data: &Value, label: &'static str, ctx: &RenderContext) -> Vec<(&'static str, String)> {
    let raw = match text_field(data, &["deadline", "closesAt", "endsAt"]) {
        Some(raw) => raw,
        None => return vec![],
    };
    match parse_deadline(&raw, ctx.branding.timezone) {
        Some(at) => vec![
            (label, format_datetime(at, ctx.branding.timezone)),
            ("Time left", time_remaining(at, ctx.now)),
        ],
        None => vec![(label, raw)],
    }
}

// ── Per-type content ───────────────────────────────────

fn verification(data: &Value, ctx: &RenderContext) -> Content {
    let app = &ctx.branding.app_name;
    Content {
        subject: format!("Verify your email for {}", app),
        heading: "Confirm your email address".to_string(),
        greeting: greeting(data),
        paragraphs: vec![format!(
            "Thanks for signing up to {}. Please confirm this is your email address so we can keep your account secure.",
            app
        )],
        facts: vec![],
        action: link_or_token(data, "verificationUrl", "verify-email", ctx.branding)
            .map(|url| ("Verify email", url)),
        footnote: Some("If you didn't create an account, you can safely ignore this email.".to_string()),
    }
}

fn welcome(data: &Value, ctx: &RenderContext) -> Content {
    let app = &ctx.branding.app_name;
    Content {
        subject: format!("Welcome to {}!", app),
        heading: format!("Welcome to {}", app),
        greeting: greeting(data),
        paragraphs: vec![
            "Your account is ready. Create a wager, challenge your friends, or test yourself in a quiz.".to_string(),
            "Fund your wallet to start playing. Higher verification levels unlock larger limits.".to_string(),
        ],
        facts: vec![],
        action: Some(("Get started", app_link(ctx.branding, "", &[]))),
        footnote: None,
    }
}

fn password_reset(data: &Value, ctx: &RenderContext) -> Content {
    let minutes = amount_field(data, &["expiresInMinutes"])
        .map(|m| m.max(1.0) as i64)
        .unwrap_or(60);
    Content {
        subject: format!("Reset your {} password", ctx.branding.app_name),
        heading: "Password reset requested".to_string(),
        greeting: greeting(data),
        paragraphs: vec![
            "We received a request to reset the password on your account.".to_string(),
            format!("The link below expires in {} minutes and can only be used once.", minutes),
        ],
        facts: vec![],
        action: link_or_token(data, "resetUrl", "reset-password", ctx.branding)
            .map(|url| ("Reset password", url)),
        footnote: Some(
            "If you didn't request this, you can ignore this email. Your password will not change."
                .to_string(),
        ),
    }
}

fn wager_invitation(data: &Value, ctx: &RenderContext) -> Content {
    let inviter = text_field(data, &["inviterName", "creatorName"]).unwrap_or_else(|| "A friend".to_string());
    let title = text_field(data, &["wagerTitle", "title"]).unwrap_or_else(|| "a wager".to_string());

    let mut facts = vec![("Wager", title.clone())];
    if let Some(stake) = money(data, &["stake", "amount"], ctx) {
        facts.push(("Stake", stake));
    }
    facts.extend(deadline_facts(data, "Closes", ctx));

    Content {
        subject: format!("{} invited you to a wager: {}", inviter, title),
        heading: "You've been challenged".to_string(),
        greeting: greeting(data),
        paragraphs: vec![format!("{} has invited you to join \"{}\". Pick a side before it closes.", inviter, title)],
        facts,
        action: text_field(data, &["wagerId", "id"])
            .map(|id| ("View wager", app_link(ctx.branding, &format!("wagers/{}", id), &[]))),
        footnote: None,
    }
}

fn wager_joined(data: &Value, ctx: &RenderContext) -> Content {
    let who = text_field(data, &["participantName", "joinerName"]).unwrap_or_else(|| "Someone".to_string());
    let title = text_field(data, &["wagerTitle", "title"]).unwrap_or_else(|| "your wager".to_string());

    let mut facts = vec![("Wager", title.clone()), ("Participant", who.clone())];
    if let Some(side) = text_field(data, &["side", "option"]) {
        facts.push(("Side", side));
    }
    if let Some(amount) = money(data, &["amount", "stake"], ctx) {
        facts.push(("Amount", amount));
    }

    Content {
        subject: format!("{} joined {}", who, title),
        heading: "New participant".to_string(),
        greeting: greeting(data),
        paragraphs: vec![format!("{} just joined \"{}\".", who, title)],
        facts,
        action: text_field(data, &["wagerId", "id"])
            .map(|id| ("View wager", app_link(ctx.branding, &format!("wagers/{}", id), &[]))),
        footnote: None,
    }
}

fn wager_settlement(data: &Value, ctx: &RenderContext) -> Content {
    let title = text_field(data, &["wagerTitle", "title"]).unwrap_or_else(|| "Your wager".to_string());
    let outcome = text_field(data, &["outcome", "result"])
        .map(|o| o.to_lowercase())
        .unwrap_or_default();
    let payout = money(data, &["payout", "amount"], ctx);

    let (subject, summary) = match outcome.as_str() {
        "won" | "win" => (
            format!("You won: {}", title),
            match &payout {
                Some(p) => format!("Congratulations! \"{}\" settled in your favour and {} has been added to your wallet.", title, p),
                None => format!("Congratulations! \"{}\" settled in your favour.", title),
            },
        ),
        "lost" | "loss" => (
            format!("Wager settled: {}", title),
            format!("\"{}\" has been settled. This one didn't go your way.", title),
        ),
        "refunded" | "cancelled" | "canceled" => (
            format!("Wager refunded: {}", title),
            match &payout {
                Some(p) => format!("\"{}\" was cancelled and {} has been returned to your wallet.", title, p),
                None => format!("\"{}\" was cancelled and your stake has been returned.", title),
            },
        ),
        _ => (
            format!("Wager settled: {}", title),
            format!("\"{}\" has been settled.", title),
        ),
    };

    let mut facts = vec![("Wager", title.clone())];
    if !outcome.is_empty() {
        facts.push(("Outcome", outcome.clone()));
    }
    if let Some(stake) = money(data, &["stake"], ctx) {
        facts.push(("Your stake", stake));
    }
    if let Some(p) = payout {
        facts.push(("Payout", p));
    }

    Content {
        subject,
        heading: "Wager settled".to_string(),
        greeting: greeting(data),
        paragraphs: vec![summary],
        facts,
        action: text_field(data, &["wagerId", "id"])
            .map(|id| ("View wager", app_link(ctx.branding, &format!("wagers/{}", id), &[]))),
        footnote: None,
    }
}

fn quiz_invitation(data: &Value, ctx: &RenderContext) -> Content {
    let inviter = text_field(data, &["inviterName", "creatorName"]).unwrap_or_else(|| "A friend".to_string());
    let title = text_field(data, &["quizTitle", "title"]).unwrap_or_else(|| "a quiz".to_string());

    let mut facts = vec![("Quiz", title.clone())];
    if let Some(fee) = money(data, &["entryFee", "stake"], ctx) {
        facts.push(("Entry fee", fee));
    }
    facts.extend(deadline_facts(data, "Closes", ctx));

    Content {
        subject: format!("{} invited you to a quiz: {}", inviter, title),
        heading: "Quiz invitation".to_string(),
        greeting: greeting(data),
        paragraphs: vec![format!("{} has invited you to take \"{}\". The best scores share the pot.", inviter, title)],
        facts,
        action: text_field(data, &["quizId", "id"])
            .map(|id| ("Take the quiz", app_link(ctx.branding, &format!("quizzes/{}", id), &[]))),
        footnote: None,
    }
}

fn quiz_settlement(data: &Value, ctx: &RenderContext) -> Content {
    let title = text_field(data, &["quizTitle", "title"]).unwrap_or_else(|| "Your quiz".to_string());
    let payout = money(data, &["payout", "amount"], ctx);
    let won = amount_field(data, &["payout", "amount"]).map(|p| p > 0.0).unwrap_or(false);

    let mut facts = vec![("Quiz", title.clone())];
    if let Some(rank) = text_field(data, &["rank", "position"]) {
        facts.push(("Rank", rank));
    }
    if let Some(score) = text_field(data, &["score"]) {
        facts.push(("Score", score));
    }
    if let Some(p) = &payout {
        facts.push(("Payout", p.clone()));
    }

    let summary = match (&payout, won) {
        (Some(p), true) => format!("Results for \"{}\" are in. {} has been added to your wallet.", title, p),
        _ => format!("Results for \"{}\" are in.", title),
    };

    Content {
        subject: format!("Quiz results: {}", title),
        heading: "Quiz settled".to_string(),
        greeting: greeting(data),
        paragraphs: vec![summary],
        facts,
        action: text_field(data, &["quizId", "id"])
            .map(|id| ("See results", app_link(ctx.branding, &format!("quizzes/{}", id), &[]))),
        footnote: None,
    }
}

fn balance_update(data: &Value, ctx: &RenderContext) -> Content {
    let kind = text_field(data, &["transactionType", "type"])
        .map(|k| k.to_lowercase())
        .unwrap_or_else(|| "update".to_string());

    let mut facts = vec![("Transaction", kind.clone())];
    if let Some(amount) = money(data, &["amount"], ctx) {
        facts.push(("Amount", amount));
    }
    if let Some(balance) = money(data, &["balance", "newBalance"], ctx) {
        facts.push(("New balance", balance));
    }
    if let Some(reason) = text_field(data, &["reason", "description"]) {
        facts.push(("Details", reason));
    }

    Content {
        subject: format!("Your {} balance has changed", ctx.branding.app_name),
        heading: "Wallet update".to_string(),
        greeting: greeting(data),
        paragraphs: vec![format!("A {} was recorded on your wallet.", kind)],
        facts,
        action: Some(("Open wallet", app_link(ctx.branding, "wallet", &[]))),
        footnote: Some("If you don't recognise this activity, contact support right away.".to_string()),
    }
}

// ── Layout ─────────────────────────────────────────────

fn support_line(branding: &Branding) -> Option<String> {
    if branding.support_email.is_empty() {
        None
    } else {
        Some(format!("Questions? Contact us at {}", branding.support_email))
    }
}

fn layout_html(subject: &str, content: &Content, branding: &Branding) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "<h1 style=\"font-size:20px;margin:0 0 16px\">{}</h1>\n",
        html_escape(&content.heading)
    ));
    body.push_str(&format!("<p>{}</p>\n", html_escape(&content.greeting)));
    for p in &content.paragraphs {
        body.push_str(&format!("<p>{}</p>\n", html_escape(p)));
    }

    if !content.facts.is_empty() {
        body.push_str("<table role=\"presentation\" style=\"width:100%;border-collapse:collapse;margin:16px 0\">\n");
        for (label, value) in &content.facts {
            body.push_str(&format!(
                "<tr><td style=\"padding:6px 0;color:#6b7280\">{}</td><td style=\"padding:6px 0;text-align:right;font-weight:600\">{}</td></tr>\n",
                html_escape(label),
                html_escape(value)
            ));
        }
        body.push_str("</table>\n");
    }

    if let Some((label, url)) = &content.action {
        body.push_str(&format!(
            "<p style=\"margin:24px 0\"><a href=\"{}\" style=\"background:#4f46e5;color:#ffffff;padding:12px 20px;border-radius:6px;text-decoration:none\">{}</a></p>\n",
            html_escape(url),
            html_escape(label)
        ));
    }

    if let Some(note) = &content.footnote {
        body.push_str(&format!(
            "<p style=\"color:#6b7280;font-size:13px\">{}</p>\n",
            html_escape(note)
        ));
    }

    let mut footer = format!("&copy; {}", html_escape(&branding.app_name));
    if let Some(line) = support_line(branding) {
        footer.push_str(&format!("<br>{}", html_escape(&line)));
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n\
         <body style=\"margin:0;padding:24px;background:#f3f4f6;font-family:Helvetica,Arial,sans-serif;color:#111827\">\n\
         <div style=\"max-width:560px;margin:0 auto;background:#ffffff;border-radius:8px;padding:32px\">\n{}</div>\n\
         <p style=\"text-align:center;color:#9ca3af;font-size:12px\">{}</p>\n</body>\n</html>\n",
        html_escape(subject),
        body,
        footer
    )
}

fn layout_text(content: &Content, branding: &Branding) -> String {
    let mut out = String::new();
    out.push_str(&content.greeting);
    out.push_str("\n\n");
    for p in &content.paragraphs {
        out.push_str(p);
        out.push_str("\n\n");
    }
    if !content.facts.is_empty() {
        for (label, value) in &content.facts {
            out.push_str(&format!("{}: {}\n", label, value));
        }
        out.push('\n');
    }
    if let Some((label, url)) = &content.action {
        out.push_str(&format!("{}: {}\n\n", label, url));
    }
    if let Some(note) = &content.footnote {
        out.push_str(note);
        out.push_str("\n\n");
    }
    out.push_str(&format!("— {}\n", branding.app_name));
    if let Some(line) = support_line(branding) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

//! Server-rendered pages.
//!
//! Deliberately plain HTML: a shared layout with navigation and flash
//! messages, and one function per page. All dynamic text goes through
//! `escape`.

use axum::http::StatusCode;
use axum::response::Html;

use super::forms::{FormErrors, DATE_FORMAT};
use super::session::Flash;
use crate::accounts::User;
use crate::todo::{Task, TaskOrder};

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, user: Option<&User>, flashes: &[Flash], body: &str) -> Html<String> {
    let nav = match user {
        Some(user) => format!(
            r#"<span>Signed in as {}</span> <a href="/home">Home</a> <a href="/add_task">Add Task</a> <a href="/logout">Logout</a>"#,
            escape(&user.username)
        ),
        None => r#"<a href="/login">Login</a> <a href="/register">Register</a>"#.to_string(),
    };
    let flashes: String = flashes
        .iter()
        .map(|f| {
            format!(
                r#"<div class="alert alert-{}">{}</div>"#,
                f.kind.as_str(),
                escape(&f.message)
            )
        })
        .collect();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title} - To-Do List</title></head>
<body>
<nav>{nav}</nav>
<main>
{flashes}
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
        nav = nav,
        flashes = flashes,
        body = body,
    ))
}

fn input(label: &str, name: &'static str, kind: &str, value: &str, errors: &FormErrors) -> String {
    let messages: String = errors
        .field(name)
        .iter()
        .map(|m| format!(r#"<span class="invalid-feedback">{}</span>"#, escape(m)))
        .collect();
    format!(
        r#"<p><label for="{name}">{label}</label> <input id="{name}" name="{name}" type="{kind}" value="{value}">{messages}</p>"#,
        name = name,
        label = escape(label),
        kind = kind,
        value = escape(value),
        messages = messages,
    )
}

fn form(action: &str, fields: &[String], submit: &str) -> String {
    format!(
        r#"<form method="POST" action="{}">{}<p><input type="submit" value="{}"></p></form>"#,
        escape(action),
        fields.concat(),
        escape(submit)
    )
}

pub fn home(user: &User, flashes: &[Flash], tasks: &[Task], order: TaskOrder) -> Html<String> {
    let rows: String = tasks
        .iter()
        .map(|t| {
            format!(
                r#"<tr class="{status}"><td>{text}</td><td>{due}</td><td>{done}</td><td><a href="/toggle_status/{id}">Toggle</a> <a href="/edit_task/{id}">Edit</a> <a href="/delete_task/{id}">Delete</a></td></tr>"#,
                status = if t.complete { "complete" } else { "pending" },
                text = escape(&t.text),
                due = t.due_date.format(DATE_FORMAT),
                done = if t.complete { "Done" } else { "Open" },
                id = t.id,
            )
        })
        .collect();
    let sorted = match order {
        TaskOrder::Insertion => "",
        TaskOrder::DueDate => "<p>Sorted by due date.</p>",
    };
    let body = format!(
        r#"<form method="POST" action="/home"><input type="submit" name="addTask" value="Add Task"> <input type="submit" name="sortTask" value="Sort by date"></form>
{sorted}
<table>
<thead><tr><th>Task</th><th>Due</th><th>Status</th><th></th></tr></thead>
<tbody>{rows}</tbody>
</table>"#,
        sorted = sorted,
        rows = rows,
    );
    layout("Your Tasks", Some(user), flashes, &body)
}

pub fn register(flashes: &[Flash], username: &str, email: &str, errors: &FormErrors) -> Html<String> {
    let body = form(
        "/register",
        &[
            input("Username", "username", "text", username, errors),
            input("Email", "email", "email", email, errors),
            input("Password", "password", "password", "", errors),
            input("Confirm Password", "confirm_password", "password", "", errors),
        ],
        "Sign Up",
    );
    layout("Register", None, flashes, &body)
}

pub fn login(flashes: &[Flash], email: &str, errors: &FormErrors) -> Html<String> {
    let fields = [
        input("Email", "email", "email", email, errors),
        input("Password", "password", "password", "", errors),
        r#"<p><input id="remember" name="remember" type="checkbox" value="y"> <label for="remember">Remember Me</label></p>"#.to_string(),
    ];
    let body = format!(
        r#"{}<p><a href="/reset_password">Forgot Password?</a></p>"#,
        form("/login", &fields, "Login")
    );
    layout("Login", None, flashes, &body)
}

pub fn reset_request(flashes: &[Flash], email: &str, errors: &FormErrors) -> Html<String> {
    let body = form(
        "/reset_password",
        &[input("Email", "email", "email", email, errors)],
        "Request Password Reset",
    );
    layout("Reset Password", None, flashes, &body)
}

pub fn reset_token(flashes: &[Flash], token: &str, errors: &FormErrors) -> Html<String> {
    let body = form(
        &format!("/reset_password/{}", token),
        &[
            input("Password", "password", "password", "", errors),
            input("Confirm Password", "confirm_password", "password", "", errors),
        ],
        "Reset Password",
    );
    layout("Reset Password", None, flashes, &body)
}

/// Shared by add and edit; `legend` tells them apart.
pub fn task_form(
    user: &User,
    flashes: &[Flash],
    legend: &str,
    action: &str,
    text: &str,
    due_date: &str,
    errors: &FormErrors,
) -> Html<String> {
    let body = form(
        action,
        &[
            input("Task", "task", "text", text, errors),
            input("Due Date", "due_date", "date", due_date, errors),
        ],
        legend,
    );
    layout(legend, Some(user), flashes, &body)
}

pub fn error_page(status: StatusCode, message: &str) -> Html<String> {
    let title = status.canonical_reason().unwrap_or("Error");
    layout(
        &format!("{} {}", status.as_u16(), title),
        None,
        &[],
        &format!(r#"<p>{}</p><p><a href="/home">Back to your tasks</a></p>"#, escape(message)),
    )
}

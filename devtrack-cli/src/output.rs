//! Rendering of command results.

use anyhow::Result;
use chrono::Utc;
use devtrack_core::{
    ApiError, AuthUser, Contractor, ContractorDashboard, Device, DeviceStatus, LoginResponse,
    PagedResult, TokenClaims, UpdateDeviceStatusRequest, UpdateDeviceStatusResponse,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

fn emit<T: Serialize>(format: Format, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Text => println!("{}", text(value)),
    }
    Ok(())
}

/// Print a failure as `KIND: message` on stderr.
pub fn report_error(error: &anyhow::Error) {
    match error.downcast_ref::<ApiError>() {
        Some(api) => match api.status {
            Some(status) => eprintln!("error: {} (HTTP {}): {}", api.kind, status, api.message),
            None => eprintln!("error: {}: {}", api.kind, api.message),
        },
        None => eprintln!("error: {:#}", error),
    }
}

pub fn login(format: Format, email: &str, response: &LoginResponse) -> Result<()> {
    emit(format, &response.user, |user| render_login(email, user.as_ref()))
}

fn render_login(email: &str, user: Option<&AuthUser>) -> String {
    match user.and_then(|u| u.name.as_deref()) {
        Some(name) => format!("Logged in as {} <{}>.", name, email),
        None => format!("Logged in as {}.", email),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutView {
    logged_out: bool,
}

pub fn logged_out(format: Format) -> Result<()> {
    emit(format, &LogoutView { logged_out: true }, |_| "Logged out.".to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshView {
    refreshed: bool,
    refresh_token_rotated: bool,
}

pub fn refreshed(format: Format, rotated: bool) -> Result<()> {
    let view = RefreshView {
        refreshed: true,
        refresh_token_rotated: rotated,
    };
    emit(format, &view, render_refresh)
}

fn render_refresh(view: &RefreshView) -> String {
    if view.refresh_token_rotated {
        "Access token refreshed (refresh token rotated).".to_string()
    } else {
        "Access token refreshed.".to_string()
    }
}

#[derive(Serialize)]
struct SessionView<'a> {
    authenticated: bool,
    claims: Option<&'a TokenClaims>,
}

pub fn status(format: Format, authenticated: bool, claims: Option<&TokenClaims>) -> Result<()> {
    let view = SessionView {
        authenticated,
        claims,
    };
    emit(format, &view, render_session)
}

fn render_session(view: &SessionView<'_>) -> String {
    let Some(claims) = view.claims else {
        return "Not logged in.".to_string();
    };

    let mut lines = vec![format!(
        "Session: {}",
        if view.authenticated { "active" } else { "expired" }
    )];
    if let Some(sub) = &claims.sub {
        lines.push(format!("  User:       {}", sub));
    }
    if let Some(email) = &claims.email {
        lines.push(format!("  Email:      {}", email));
    }
    if !claims.roles.is_empty() {
        lines.push(format!("  Roles:      {}", claims.roles.join(", ")));
    }
    if let Some(id) = &claims.contractor_id {
        lines.push(format!("  Contractor: {}", id));
    }
    if let Some(expires_at) = claims.expires_at() {
        let left = expires_at - Utc::now();
        let suffix = if left.num_seconds() > 0 {
            format!(" (in {} min)", left.num_minutes())
        } else {
            String::new()
        };
        lines.push(format!(
            "  Expires:    {}{}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
            suffix
        ));
    }
    lines.join("\n")
}

pub fn devices(format: Format, page: &PagedResult<Device>) -> Result<()> {
    emit(format, page, render_devices)
}

fn render_devices(page: &PagedResult<Device>) -> String {
    if page.items.is_empty() {
        return format!("No devices ({} total).", page.total_count);
    }

    let mut lines = vec![format!("{:<20} {:<16} {:<12} RETURNED", "SERIAL", "STATUS", "ASSIGNED")];
    for device in &page.items {
        lines.push(format!(
            "{:<20} {:<16} {:<12} {}",
            device.serial_number,
            device.status,
            device
                .assigned_date
                .as_deref()
                .map(|date| date.get(..10).unwrap_or(date))
                .unwrap_or("-"),
            if device.is_returned { "yes" } else { "no" }
        ));
    }
    lines.push(format!("{} of {} devices", page.items.len(), page.total_count));
    lines.join("\n")
}

pub fn device_status(format: Format, device: &DeviceStatus) -> Result<()> {
    emit(format, device, |d| format!("{}: {}", d.serial_number, d.status))
}

pub fn status_update(
    format: Format,
    request: &UpdateDeviceStatusRequest,
    response: &UpdateDeviceStatusResponse,
) -> Result<()> {
    emit(format, response, |r| {
        if r.message.is_empty() {
            format!("{} is now {}.", request.serial_number, request.new_status)
        } else {
            r.message.clone()
        }
    })
}

pub fn contractor(format: Format, contractor: &Contractor) -> Result<()> {
    emit(format, contractor, |c| {
        let mut lines = vec![format!("{} (#{})", c.contractor_name, c.contractor_id)];
        if let Some(phone) = &c.contact_phone {
            lines.push(format!("  Phone: {}", phone));
        }
        lines.join("\n")
    })
}

pub fn dashboard(format: Format, contractor_id: &str, dashboard: &ContractorDashboard) -> Result<()> {
    emit(format, dashboard, |d| render_dashboard(contractor_id, d))
}

fn render_dashboard(contractor_id: &str, dashboard: &ContractorDashboard) -> String {
    let mut lines = vec![
        format!("Contractor #{}", contractor_id),
        format!("  Total:           {}", dashboard.total),
        format!("  Pending install: {}", dashboard.pending_install),
        format!("  Installed:       {}", dashboard.installed),
        format!("  Activated:       {}", dashboard.activated),
    ];
    if !dashboard.monthly_trends.is_empty() {
        lines.push(format!(
            "  {:<10} {:>8} {:>10} {:>10}",
            "MONTH", "ASSIGNED", "INSTALLED", "ACTIVATED"
        ));
        for trend in &dashboard.monthly_trends {
            lines.push(format!(
                "  {:<10} {:>8} {:>10} {:>10}",
                trend.month, trend.assigned_count, trend.installed_count, trend.activated_count
            ));
        }
    }
    lines.join("\n")
}

//! Reply payloads. Field order of each struct is the order on the wire.

use actix_web::{
    HttpResponse,
    http::{StatusCode, header},
};
use serde::Serialize;

use crate::registry::{ChannelInfo, ChannelState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub id: usize,
    pub name: String,
    pub state: u8,
}

impl From<&ChannelInfo> for ChannelStatus {
    fn from(info: &ChannelInfo) -> Self {
        Self {
            id: info.id,
            name: info.name.clone(),
            state: info.state.as_u8(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkStatus {
    pub relays: Vec<ChannelStatus>,
}

impl BulkStatus {
    pub fn new(channels: &[ChannelInfo]) -> Self {
        Self {
            relays: channels.iter().map(ChannelStatus::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkResult {
    pub success: bool,
    pub message: String,
}

impl BulkResult {
    pub fn all(state: ChannelState) -> Self {
        let message = match state {
            ChannelState::On => "All relays ON",
            ChannelState::Off => "All relays OFF",
        };
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// JSON reply with the cross-origin header every API response carries.
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    HttpResponse::build(status)
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(body)
}

pub fn ok<T: Serialize>(body: &T) -> HttpResponse {
    json(StatusCode::OK, body)
}

const HOME_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>Relay Control</title>
<style>
*{box-sizing:border-box;margin:0;padding:0}
body{font-family:system-ui,sans-serif;background:#1a1a2e;color:#eee;min-height:100vh;padding:20px}
h1{text-align:center;margin-bottom:20px;color:#0f0}
.info{text-align:center;color:#888;margin-bottom:20px;font-size:14px}
.grid{display:grid;grid-template-columns:repeat(auto-fit,minmax(150px,1fr));gap:15px;max-width:600px;margin:0 auto}
.card{background:#16213e;border-radius:12px;padding:20px;text-align:center}
.name{font-size:14px;color:#888;margin-bottom:10px}
.btn{width:100%;padding:15px;border:none;border-radius:8px;font-size:16px;font-weight:bold;cursor:pointer}
.btn.on{background:#00ff88;color:#000}
.btn.off{background:#333;color:#888}
.all{margin-top:20px;display:flex;gap:10px;justify-content:center}
.all button{padding:10px 20px;border:none;border-radius:6px;cursor:pointer;font-weight:bold}
</style>
</head><body>
<h1>Relay Control</h1>
<p class="info">IP: {{address}}</p>
<div class="grid">
{{cards}}</div>
<div class="all">
<button onclick="bulk('on')">All ON</button>
<button onclick="bulk('off')">All OFF</button>
</div>
<script>
function paint(id,state){const b=document.getElementById('r'+id);b.className='btn '+(state?'on':'off');b.textContent=state?'ON':'OFF';}
async function toggle(id){const r=await fetch('/channel/'+id+'/toggle');const d=await r.json();paint(d.id,d.state);}
async function bulk(action){await fetch('/channel/all/'+action);const r=await fetch('/channel/all/status');const d=await r.json();d.relays.forEach(c=>paint(c.id,c.state));}
</script>
</body></html>
"#;

pub fn home_page(address: &str, channels: &[ChannelInfo]) -> HttpResponse {
    let cards: String = channels
        .iter()
        .map(|c| {
            let (class, label) = match c.state {
                ChannelState::On => ("on", "ON"),
                ChannelState::Off => ("off", "OFF"),
            };
            format!(
                "<div class=\"card\"><div class=\"name\">{name}</div>\
                 <button class=\"btn {class}\" id=\"r{id}\" onclick=\"toggle({id})\">{label}</button></div>\n",
                name = escape_html(&c.name),
                id = c.id,
            )
        })
        .collect();

    let body = HOME_TEMPLATE
        .replace("{{address}}", &escape_html(address))
        .replace("{{cards}}", &cards);

    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The single-page UI: compose form, progress bar, live log, final counts.
///
/// Talks to `/api/broadcast`, `/api/status` and `/ws`. An `api_key` query
/// parameter on the page URL is forwarded to every call.
pub const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Broadcaster</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 46rem; margin: 2rem auto; padding: 0 1rem; }
  textarea { width: 100%; box-sizing: border-box; }
  #log { height: 14rem; font-family: ui-monospace, monospace; font-size: .85rem; }
  .notice { padding: .6rem .8rem; border-radius: .3rem; margin: .8rem 0; }
  .info { background: #e8f0fe; } .error { background: #fde8e8; }
  .warning { background: #fff6dd; } .success { background: #e6f6ea; }
  .metrics { display: flex; gap: 2rem; } .metric b { font-size: 1.8rem; display: block; }
  .fail { color: #b3261e; }
  [hidden] { display: none !important; }
</style>
</head>
<body>
<h1>Global Broadcaster</h1>
<form id="compose">
  <h3>Compose Message</h3>
  <textarea id="message" rows="7" placeholder="Message Content"></textarea>
  <p><button type="submit" id="start">Start Broadcast</button></p>
</form>
<div id="status" class="notice" hidden></div>
<progress id="progress" max="1" value="0" hidden></progress>
<div id="log-box" hidden>
  <h4>Live Logs</h4>
  <textarea id="log" readonly></textarea>
</div>
<div id="metrics" class="metrics" hidden>
  <div class="metric">Telegram<b id="tg-ok">0</b><span class="fail" id="tg-fail"></span></div>
  <div class="metric">Email<b id="em-ok">0</b><span class="fail" id="em-fail"></span></div>
</div>
<script>
const key = new URLSearchParams(location.search).get("api_key");
const withKey = (path) => key ? `${path}?api_key=${encodeURIComponent(key)}` : path;
const $ = (id) => document.getElementById(id);

function notice(kind, text) {
  const el = $("status");
  el.className = `notice ${kind}`;
  el.textContent = text;
  el.hidden = !text;
}

function render(snap) {
  if (!snap.run_id) return;
  $("progress").hidden = false;
  $("progress").value = snap.total ? snap.completed / snap.total : 0;
  $("log-box").hidden = snap.log.length === 0;
  $("log").value = snap.log.join("\n");
  if (snap.error) {
    notice("error", `Broadcast aborted: ${snap.error}`);
    $("progress").hidden = true;
  } else if (snap.stats) {
    notice("success", "Broadcast Complete!");
    $("progress").hidden = true;
    $("metrics").hidden = false;
    $("tg-ok").textContent = snap.stats.tg_ok;
    $("tg-fail").textContent = `-${snap.stats.tg_fail} fail`;
    $("em-ok").textContent = snap.stats.em_ok;
    $("em-fail").textContent = `-${snap.stats.em_fail} fail`;
  } else if (snap.state === "connecting" || !snap.state) {
    notice("info", "Initializing connection...");
  } else {
    notice("info", "Sending messages...");
  }
  $("start").disabled = !snap.error && !snap.stats;
}

async function refresh() {
  const resp = await fetch(withKey("/api/status"));
  if (resp.ok) render(await resp.json());
}

function connect() {
  const proto = location.protocol === "https:" ? "wss" : "ws";
  const ws = new WebSocket(`${proto}://${location.host}${withKey("/ws")}`);
  ws.onmessage = (msg) => {
    const data = JSON.parse(msg.data);
    if (data.type === "snapshot") render(data.snapshot);
    if (data.type === "run_event") refresh();
  };
  ws.onclose = () => setTimeout(connect, 2000);
}

$("compose").addEventListener("submit", async (ev) => {
  ev.preventDefault();
  const message = $("message").value;
  if (!message.trim()) { notice("warning", "Message is empty!"); return; }
  $("metrics").hidden = true;
  const resp = await fetch(withKey("/api/broadcast"), {
    method: "POST",
    headers: { "content-type": "application/json" },
    body: JSON.stringify({ message }),
  });
  const body = await resp.json().catch(() => ({}));
  if (!resp.ok) { notice(resp.status === 409 ? "warning" : "error", body.error || resp.statusText); return; }
  notice("info", "Initializing connection...");
  refresh();
});

connect();
refresh();
</script>
</body>
</html>
"#;

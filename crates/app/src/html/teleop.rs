pub const TELEOP_HTML: &str = r##"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Teleop</title>
  <style>
    body { margin: 0; background: #0b0f14; color: #e5e7eb; font-family: system-ui, sans-serif; }
    main { display: flex; flex-wrap: wrap; gap: 24px; justify-content: center; align-items: center; padding: 16px; }
    img { max-width: min(100%, 800px); border-radius: 6px; background: #111827; }
    .panel { display: flex; flex-direction: column; align-items: center; gap: 8px; }
    canvas { touch-action: none; cursor: grab; border-radius: 50%; background: #111827; }
    .readout { font: 13px monospace; }
    #link { font-size: 12px; padding: 3px 8px; border-radius: 4px; }
    .up { background: #10b981; color: #000; }
    .down { background: #ef4444; color: #fff; }
  </style>
</head>
<body>
<main>
  <img id="feed" src="/feed" alt="robot camera" />
  <div class="panel">
    <canvas id="stick" width="240" height="240"></canvas>
    <div class="readout">forward <span id="fwd">0.00</span> &middot; turn <span id="turn">0.00</span></div>
    <div id="link" class="down">offline</div>
  </div>
</main>
<script>
const canvas = document.getElementById("stick");
const ctx = canvas.getContext("2d");
const cx = canvas.width / 2;
const cy = canvas.height / 2;
const reach = 80;
let knob = { x: cx, y: cy };
let dragging = false;
let ws = null;

function draw() {
  ctx.clearRect(0, 0, canvas.width, canvas.height);
  ctx.strokeStyle = "#374151";
  ctx.lineWidth = 2;
  ctx.beginPath();
  ctx.arc(cx, cy, 100, 0, 2 * Math.PI);
  ctx.moveTo(cx - 100, cy); ctx.lineTo(cx + 100, cy);
  ctx.moveTo(cx, cy - 100); ctx.lineTo(cx, cy + 100);
  ctx.stroke();
  ctx.beginPath();
  ctx.arc(knob.x, knob.y, 24, 0, 2 * Math.PI);
  ctx.fillStyle = "#22c55e";
  ctx.fill();
}

function send() {
  const x = (knob.x - cx) / reach;
  const y = -(knob.y - cy) / reach;
  document.getElementById("fwd").textContent = y.toFixed(2);
  document.getElementById("turn").textContent = (-x).toFixed(2);
  if (ws && ws.readyState === WebSocket.OPEN) {
    // Right deflection turns clockwise, i.e. negative yaw.
    ws.send(JSON.stringify({ x: -x, y: y }));
  }
}

function moveTo(clientX, clientY) {
  const rect = canvas.getBoundingClientRect();
  let dx = clientX - rect.left - cx;
  let dy = clientY - rect.top - cy;
  const dist = Math.hypot(dx, dy);
  if (dist > reach) {
    dx = (dx / dist) * reach;
    dy = (dy / dist) * reach;
  }
  knob = { x: cx + dx, y: cy + dy };
  draw();
  send();
}

function release() {
  dragging = false;
  knob = { x: cx, y: cy };
  draw();
  send();
}

canvas.addEventListener("pointerdown", (e) => {
  dragging = true;
  canvas.setPointerCapture(e.pointerId);
  moveTo(e.clientX, e.clientY);
});
canvas.addEventListener("pointermove", (e) => { if (dragging) moveTo(e.clientX, e.clientY); });
canvas.addEventListener("pointerup", release);
canvas.addEventListener("pointercancel", release);

function connect() {
  const linkEl = document.getElementById("link");
  const scheme = location.protocol === "https:" ? "wss://" : "ws://";
  ws = new WebSocket(scheme + location.host + "/ws");
  ws.onopen = () => { linkEl.textContent = "connected"; linkEl.className = "up"; };
  ws.onclose = () => {
    linkEl.textContent = "offline";
    linkEl.className = "down";
    setTimeout(connect, 1000);
  };
}

connect();
draw();
</script>
</body>
</html>
"##;

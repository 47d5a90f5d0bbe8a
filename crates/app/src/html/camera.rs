pub const CAMERA_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Camera Stream</title>
  <style>
    body { margin: 0; background: #0b0f14; color: #e5e7eb; font-family: system-ui, sans-serif; }
    main { display: flex; flex-direction: column; align-items: center; gap: 12px; padding: 16px; }
    img { max-width: 100%; border-radius: 6px; background: #111827; }
    #status { font-family: monospace; font-size: 13px; padding: 4px 10px; border-radius: 4px; }
    .active { background: #10b981; color: #000; }
    .waiting { background: #f59e0b; color: #000; }
    .error { background: #ef4444; color: #fff; }
  </style>
</head>
<body>
<main>
  <img id="feed" src="/stream" alt="camera stream" />
  <div id="status" class="waiting">waiting</div>
</main>
<script>
const statusEl = document.getElementById("status");
const feed = document.getElementById("feed");

feed.addEventListener("error", () => {
  setTimeout(() => { feed.src = "/stream?t=" + Date.now(); }, 1000);
});

async function pollStatus() {
  try {
    const res = await fetch("/status", { cache: "no-store" });
    const body = await res.json();
    statusEl.textContent = body.status + " (queue " + body.queue_size + ")";
    statusEl.className = body.status;
  } catch (err) {
    statusEl.textContent = "unreachable";
    statusEl.className = "error";
  }
}
setInterval(pollStatus, 2000);
pollStatus();
</script>
</body>
</html>
"#;

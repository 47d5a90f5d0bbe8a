pub const POINTS_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Point Cloud Stream</title>
  <style>
    body { margin: 0; overflow: hidden; background: #0a0a0a; color: #fff; font-family: system-ui, sans-serif; }
    #viewer { width: 100vw; height: 100vh; }
    #info { position: absolute; top: 10px; left: 10px; padding: 8px 10px; border-radius: 5px;
            background: rgba(0, 0, 0, 0.75); font: 12px monospace; }
    #link { position: absolute; top: 10px; right: 10px; padding: 4px 10px; border-radius: 5px; font-size: 12px; }
    .up { background: #10b981; color: #000; }
    .down { background: #ef4444; color: #fff; }
  </style>
</head>
<body>
<div id="viewer"></div>
<div id="info">
  <div>points <span id="count">0</span></div>
  <div>frames/s <span id="rate">0</span></div>
</div>
<div id="link" class="down">offline</div>

<script type="importmap">
{ "imports": { "three": "https://cdn.jsdelivr.net/npm/three@0.160.0/build/three.module.js" } }
</script>
<script type="module">
import * as THREE from "three";
import { OrbitControls } from "https://cdn.jsdelivr.net/npm/three@0.160.0/examples/jsm/controls/OrbitControls.js";

const MAX_POINTS = 100000;

// IEEE 754 binary16 -> binary32, keeping subnormals, infinities and NaN.
function halfToFloat(bits) {
  const sign = bits & 0x8000 ? -1 : 1;
  const exponent = (bits >> 10) & 0x1f;
  const mantissa = bits & 0x3ff;
  if (exponent === 0) return sign * Math.pow(2, -14) * (mantissa / 1024);
  if (exponent === 0x1f) return mantissa ? NaN : sign * Infinity;
  return sign * Math.pow(2, exponent - 15) * (1 + mantissa / 1024);
}

function decodeFrame(buffer) {
  if (buffer.byteLength < 4) return null;
  const view = new DataView(buffer);
  const count = view.getInt32(0, true);
  if (!(count > 0 && count < MAX_POINTS)) return null;

  const positionsEnd = 4 + count * 6;
  if (buffer.byteLength < positionsEnd) return null;
  const positions = new Float32Array(count * 3);
  for (let i = 0; i < count * 3; i++) {
    positions[i] = halfToFloat(view.getUint16(4 + i * 2, true));
  }

  let colors = null;
  if (buffer.byteLength >= positionsEnd + count * 3) {
    const raw = new Uint8Array(buffer, positionsEnd, count * 3);
    colors = new Float32Array(count * 3);
    for (let i = 0; i < raw.length; i++) colors[i] = raw[i] / 255;
  }
  return { count, positions, colors };
}

const scene = new THREE.Scene();
scene.background = new THREE.Color(0x0a0a0a);
const camera = new THREE.PerspectiveCamera(70, innerWidth / innerHeight, 0.01, 100);
camera.up.set(0, 0, 1);
camera.position.set(0, -3, 2);
const renderer = new THREE.WebGLRenderer({ antialias: true });
renderer.setSize(innerWidth, innerHeight);
renderer.setPixelRatio(devicePixelRatio);
document.getElementById("viewer").appendChild(renderer.domElement);
const controls = new OrbitControls(camera, renderer.domElement);
controls.enableDamping = true;

const grid = new THREE.GridHelper(10, 10, 0x444444, 0x222222);
grid.rotation.x = Math.PI / 2;
scene.add(grid, new THREE.AxesHelper(1));

const geometry = new THREE.BufferGeometry();
const material = new THREE.PointsMaterial({ size: 0.015, vertexColors: false, color: 0x38bdf8 });
scene.add(new THREE.Points(geometry, material));

addEventListener("resize", () => {
  camera.aspect = innerWidth / innerHeight;
  camera.updateProjectionMatrix();
  renderer.setSize(innerWidth, innerHeight);
});

const countEl = document.getElementById("count");
const rateEl = document.getElementById("rate");
const linkEl = document.getElementById("link");
let frames = 0;

function connect() {
  const scheme = location.protocol === "https:" ? "wss://" : "ws://";
  const ws = new WebSocket(scheme + location.host + "/ws/points");
  ws.binaryType = "arraybuffer";
  ws.onopen = () => { linkEl.textContent = "live"; linkEl.className = "up"; };
  ws.onmessage = (event) => {
    if (!(event.data instanceof ArrayBuffer)) return;
    const cloud = decodeFrame(event.data);
    if (!cloud) return;
    geometry.setAttribute("position", new THREE.BufferAttribute(cloud.positions, 3));
    if (cloud.colors) {
      geometry.setAttribute("color", new THREE.BufferAttribute(cloud.colors, 3));
    } else {
      geometry.deleteAttribute("color");
    }
    material.vertexColors = cloud.colors !== null;
    material.needsUpdate = true;
    geometry.computeBoundingSphere();
    countEl.textContent = cloud.count.toLocaleString();
    frames++;
  };
  ws.onclose = () => {
    linkEl.textContent = "offline";
    linkEl.className = "down";
    setTimeout(connect, 1000);
  };
}
connect();

setInterval(() => { rateEl.textContent = frames; frames = 0; }, 1000);

(function animate() {
  requestAnimationFrame(animate);
  controls.update();
  renderer.render(scene, camera);
})();
</script>
</body>
</html>
"#;

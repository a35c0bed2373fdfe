//! Embedded HTML/CSS/JS frontend for the safedash web dashboard.
//!
//! The entire page is compiled into the binary as a string constant.
//! No external assets, no build tools, no CDN dependencies.

/// The complete single-page dashboard HTML.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>safedash</title>
<style>
:root {
  --bg: #0d1117;
  --surface: #161b22;
  --border: #30363d;
  --text: #e6edf3;
  --text-muted: #8b949e;
  --accent: #58a6ff;
  --green: #3fb950;
  --red: #f85149;
  --radius: 8px;
  --font: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
}

* { margin: 0; padding: 0; box-sizing: border-box; }
body {
  background: var(--bg);
  color: var(--text);
  font-family: var(--font);
  font-size: 14px;
  line-height: 1.5;
}

.app { max-width: 1280px; margin: 0 auto; padding: 24px; }

header {
  display: flex;
  align-items: center;
  justify-content: space-between;
  margin-bottom: 24px;
  padding-bottom: 16px;
  border-bottom: 1px solid var(--border);
}
header h1 { font-size: 22px; font-weight: 600; }
header .meta { color: var(--text-muted); font-size: 12px; }

button {
  background: var(--accent);
  color: #0d1117;
  border: 0;
  border-radius: var(--radius);
  padding: 6px 14px;
  font-weight: 600;
  cursor: pointer;
}
button:disabled { opacity: .5; cursor: wait; }

.notice {
  margin-bottom: 16px;
  padding: 10px 14px;
  border-radius: var(--radius);
  border: 1px solid var(--red);
  color: var(--red);
  display: none;
}
.notice.info { border-color: var(--green); color: var(--green); }

.kpis { display: grid; grid-template-columns: repeat(4, 1fr); gap: 12px; margin-bottom: 24px; }
.kpi { background: var(--surface); border: 1px solid var(--border); border-radius: var(--radius); padding: 16px; }
.kpi .label { color: var(--text-muted); font-size: 12px; text-transform: uppercase; }
.kpi .value { font-size: 28px; font-weight: 600; }

.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(380px, 1fr)); gap: 16px; }
.card { background: var(--surface); border: 1px solid var(--border); border-radius: var(--radius); padding: 16px; min-height: 160px; }
.card h2 { font-size: 14px; margin-bottom: 12px; }
.card .state { color: var(--text-muted); }
.card .error { color: var(--red); }

.bar-row { display: flex; align-items: center; gap: 8px; margin: 3px 0; font-size: 12px; }
.bar-row .name { width: 120px; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; }
.bar-row .bar { height: 10px; background: var(--accent); border-radius: 3px; }
.bar-row .num { color: var(--text-muted); }

table { width: 100%; border-collapse: collapse; font-size: 12px; }
th, td { padding: 3px 6px; border-bottom: 1px solid var(--border); text-align: left; }
td.cell { text-align: center; }
</style>
</head>
<body>
<div class="app">
  <header>
    <div>
      <h1>Safety Dashboard</h1>
      <div class="meta" id="updated">Not loaded yet</div>
    </div>
    <button id="refresh">Refresh</button>
  </header>
  <div class="notice" id="notice"></div>
  <div class="kpis" id="kpis"></div>
  <div class="grid" id="grid"></div>
</div>
<script>
const $ = (id) => document.getElementById(id);
const esc = (s) => String(s).replace(/[&<>"]/g, (c) => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;'}[c]));
const fmt = (n) => Number.isInteger(n) ? n.toLocaleString() : n.toFixed(1);

function bars(points, key) {
  const max = Math.max(1, ...points.map((p) => p.value));
  return points.map((p) =>
    `<div class="bar-row"><span class="name" title="${esc(p[key])}">${esc(p[key])}</span>` +
    `<span class="bar" style="width:${(p.value / max) * 200}px"></span>` +
    `<span class="num">${fmt(p.value)}</span></div>`).join('');
}

function grouped(g) {
  const head = `<tr><th></th>${g.series.map((s) => `<th>${esc(s)}</th>`).join('')}</tr>`;
  const rows = g.rows.map((r) =>
    `<tr><td>${esc(r.name)}</td>${g.series.map((s) => `<td class="cell">${fmt(r[s] ?? 0)}</td>`).join('')}</tr>`).join('');
  return `<table>${head}${rows}</table>`;
}

function heat(h) {
  const span = h.max - h.min;
  const alpha = (v) => span > 0 ? (v - h.min) / span : 0;
  const head = `<tr><th></th>${h.x_labels.map((x) => `<th>${esc(x)}</th>`).join('')}</tr>`;
  const rows = h.y_labels.map((y, i) =>
    `<tr><td>${esc(y)}</td>${(h.values[i] || []).map((v) =>
      `<td class="cell" style="background:rgba(248,81,73,${alpha(v).toFixed(2)})">${fmt(v)}</td>`).join('')}</tr>`).join('');
  return `<table>${head}${rows}</table>`;
}

function body(slot) {
  if (slot.loading) return '<div class="state">Loading…</div>';
  if (slot.error) return `<div class="error">${esc(slot.error)}</div>`;
  const model = slot.data;
  if (!model) return '<div class="state">No data</div>';
  switch (model.kind) {
    case 'category': return model.data.length ? bars(model.data, 'name') : '<div class="state">No data</div>';
    case 'trend': return model.data.length ? bars(model.data, 'period') : '<div class="state">No data</div>';
    case 'grouped': return model.data.rows.length ? grouped(model.data) : '<div class="state">No data</div>';
    case 'heat': return model.data.x_labels.length && model.data.y_labels.length ? heat(model.data) : '<div class="state">No data</div>';
  }
  return '';
}

function render(snap) {
  $('updated').textContent = snap.last_updated
    ? `Last updated ${new Date(snap.last_updated).toLocaleString()} · cycle ${snap.generation}`
    : `cycle ${snap.generation}`;
  $('kpis').innerHTML = snap.kpis.map((k) =>
    `<div class="kpi"><div class="label">${esc(k.label)}</div><div class="value">${fmt(k.value)}</div></div>`).join('');
  $('grid').innerHTML = snap.slots.map((e) =>
    `<div class="card"><h2>${esc(e.resource.title)}</h2>${body(e.slot)}</div>`).join('');
  const n = snap.last_notice;
  const box = $('notice');
  if (n) {
    box.textContent = n.message;
    box.className = `notice ${n.level}`;
    box.style.display = 'block';
  } else {
    box.style.display = 'none';
  }
}

async function load() {
  const resp = await fetch('/api/dashboard');
  render(await resp.json());
}

async function refresh() {
  const btn = $('refresh');
  btn.disabled = true;
  const pending = fetch('/api/refresh', { method: 'POST' });
  const poll = setInterval(load, 500);
  try { await pending; } finally {
    clearInterval(poll);
    btn.disabled = false;
    await load();
  }
}

$('refresh').addEventListener('click', refresh);
load();
setInterval(load, 5000);
</script>
</body>
</html>
"##;

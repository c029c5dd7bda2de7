use crate::server::api;
use crate::session::SessionContext;

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn to_http_string(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status_code,
            self.status_text,
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

pub fn route_request(
    session: &mut SessionContext,
    method: &str,
    path: &str,
    body: &str,
) -> HttpResponse {
    let route = path.split('?').next().unwrap_or(path);
    match (method, route) {
        ("GET", "/") => html_response(index_html()),
        ("GET", "/api/health") => json_result(api::health_payload(session)),
        ("GET", "/api/categories") => json_result(api::categories_payload(session)),
        ("GET", "/api/schools") => json_result(api::schools_payload(session, path)),
        ("GET", "/api/map") => html_response(api::map_page(session, path)),
        ("GET", "/api/cache") => json_result(api::cache_payload(session)),
        ("GET", "/api/records") => json_result(api::record_get_payload(session, path)),
        ("PUT", "/api/records") => json_result(api::record_put_payload(session, body)),
        ("POST", "/api/records/clear") => json_result(api::record_clear_payload(session, body)),
        _ => error_response(404, "Not Found", "Route not found"),
    }
}

fn json_result(result: Result<String, api::ApiError>) -> HttpResponse {
    match result {
        Ok(payload) => HttpResponse {
            status_code: 200,
            status_text: "OK",
            content_type: "application/json",
            body: payload,
        },
        Err(err) => {
            let (status_code, status_text) = err.status();
            if status_code >= 500 {
                tracing::error!(%err, "request failed");
            }
            error_response(status_code, status_text, &err.to_string())
        }
    }
}

fn html_response(body: String) -> HttpResponse {
    HttpResponse {
        status_code: 200,
        status_text: "OK",
        content_type: "text/html; charset=utf-8",
        body,
    }
}

fn error_response(status_code: u16, status_text: &'static str, message: &str) -> HttpResponse {
    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        body: format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        ),
    }
}

fn index_html() -> String {
    r#"<!doctype html>
<html lang="de">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <title>Makerspaces Bayern</title>
  <style>
    body { font-family: Arial, sans-serif; margin: 0; display: flex; }
    aside { width: 320px; padding: 12px 16px; border-right: 1px solid #ddd; box-sizing: border-box; height: 100vh; overflow: auto; }
    main { padding: 12px 16px; }
    h1 { font-size: 1.4rem; }
    h2 { font-size: 1.05rem; margin-top: 18px; }
    label { display: block; margin: 8px 0 4px; font-weight: 600; }
    input, select, textarea { width: 100%; padding: 6px; box-sizing: border-box; }
    .types label { font-weight: normal; margin: 2px 0; }
    .types input { width: auto; }
    .row { display: flex; gap: 8px; margin-top: 12px; }
    #msg { margin-top: 10px; color: #2a7a2a; min-height: 1.2em; }
    iframe { width: 1200px; height: 700px; border: 1px solid #ccc; }
  </style>
</head>
<body>
  <aside>
    <h2>Filter &amp; Verwaltung</h2>
    <label>Schularten</label>
    <div id="types" class="types"></div>

    <h2>Makerspace bearbeiten</h2>
    <label for="school">Schule wählen</label>
    <select id="school"></select>
    <label for="space_name">Makerspace-Name</label>
    <input id="space_name" />
    <label for="tools">Werkzeuge</label>
    <textarea id="tools" rows="6"></textarea>
    <label for="contact">Ansprechpartner</label>
    <input id="contact" />
    <label for="email">E-Mail</label>
    <input id="email" />
    <label for="website">Webseite</label>
    <input id="website" />
    <div class="row"><button id="save-btn">Speichern</button></div>
    <div id="delete-box" style="display:none;">
      <label for="password">Passwort</label>
      <input id="password" type="password" />
      <div class="row"><button id="delete-btn">Löschen</button></div>
    </div>
    <div id="msg"></div>
  </aside>
  <main>
    <h1>Makerspaces an Schulen in Bayern</h1>
    <iframe id="map" title="Karte"></iframe>
  </main>

  <script>
    const typesEl = document.getElementById('types');
    const schoolEl = document.getElementById('school');
    const mapEl = document.getElementById('map');
    const msgEl = document.getElementById('msg');
    const fields = ['space_name', 'contact', 'email', 'website'];

    function selectedTypes() {
      return Array.from(typesEl.querySelectorAll('input:checked')).map(el => el.value);
    }
    function typesQuery() {
      return 'types=' + encodeURIComponent(selectedTypes().join(','));
    }

    async function refreshMap() {
      mapEl.src = '/api/map?' + typesQuery() + '&t=' + Date.now();
    }

    async function refreshSchools() {
      const current = schoolEl.value;
      const data = await (await fetch('/api/schools?' + typesQuery())).json();
      schoolEl.innerHTML = '';
      data.schools.forEach(name => {
        const opt = document.createElement('option');
        opt.value = name;
        opt.textContent = name;
        schoolEl.appendChild(opt);
      });
      if (data.schools.includes(current)) schoolEl.value = current;
      await loadRecord();
    }

    async function loadRecord() {
      if (!schoolEl.value) return;
      const res = await fetch('/api/records?name=' + encodeURIComponent(schoolEl.value));
      if (!res.ok) return;
      const data = await res.json();
      fields.forEach(f => { document.getElementById(f).value = data.record[f] || ''; });
      document.getElementById('tools').value = (data.record.tools || []).join(', ');
      document.getElementById('delete-box').style.display = data.has_space ? 'block' : 'none';
    }

    async function onFilterChange() {
      await refreshSchools();
      await refreshMap();
    }

    document.getElementById('save-btn').addEventListener('click', async () => {
      const payload = { name: schoolEl.value, tools: document.getElementById('tools').value };
      fields.forEach(f => { payload[f] = document.getElementById(f).value; });
      const res = await fetch('/api/records', {
        method: 'PUT',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify(payload),
      });
      msgEl.textContent = res.ok ? 'Gespeichert ✓' : '';
      await loadRecord();
      await refreshMap();
    });

    document.getElementById('delete-btn').addEventListener('click', async () => {
      const res = await fetch('/api/records/clear', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ name: schoolEl.value, password: document.getElementById('password').value }),
      });
      const data = res.ok ? await res.json() : {};
      msgEl.textContent = data.cleared ? 'Gelöscht 🗑️' : '';
      document.getElementById('password').value = '';
      await loadRecord();
      await refreshMap();
    });

    schoolEl.addEventListener('change', () => { msgEl.textContent = ''; loadRecord(); });

    fetch('/api/categories').then(r => r.json()).then(data => {
      data.categories.forEach(type => {
        const label = document.createElement('label');
        const box = document.createElement('input');
        box.type = 'checkbox';
        box.value = type;
        box.addEventListener('change', onFilterChange);
        label.appendChild(box);
        label.appendChild(document.createTextNode(' ' + type));
        typesEl.appendChild(label);
      });
      onFilterChange();
    });
  </script>
</body>
</html>
"#
    .to_string()
}

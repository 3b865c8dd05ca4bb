//! Named, parameterized page queries
//!
//! Every script evaluated inside the remote page is built here as a
//! data-driven template: inputs (selector lists, marker lists, text) are
//! JSON-serialized into the expression, and the script returns a single
//! JSON-serializable record that deserializes into a typed struct. Keeping
//! the templates in one place makes the output shapes unit-testable without
//! a live browser and keeps ad hoc string concatenation out of the steps.

use serde::Deserialize;

fn js_list(items: &[&str]) -> String {
    serde_json::to_string(items).expect("static selector lists always serialize")
}

fn js_str(text: &str) -> String {
    serde_json::to_string(text).expect("strings always serialize")
}

// ---------------------------------------------------------------------------
// Output records
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReadyState {
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct BlockProbe {
    pub title: String,
    pub blocked: bool,
}

#[derive(Debug, Deserialize)]
pub struct ComposerProbe {
    pub found: bool,
    pub selector: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ClickOutcome {
    pub clicked: bool,
    pub selector: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SwitcherLabel {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuOption {
    pub label: String,
    #[serde(rename = "testId")]
    pub test_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MenuOptions {
    pub options: Vec<MenuOption>,
}

#[derive(Debug, Deserialize)]
pub struct FocusOutcome {
    pub focused: bool,
    pub selector: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ComposerText {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ForceWrite {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct Confirmed {
    pub confirmed: bool,
}

#[derive(Debug, Deserialize)]
pub struct UploadState {
    pub uploading: bool,
    #[serde(rename = "sendEnabled")]
    pub send_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResponseProbe {
    pub found: bool,
    pub text: String,
    pub html: Option<String>,
    #[serde(rename = "turnId")]
    pub turn_id: Option<String>,
    pub generating: bool,
}

#[derive(Debug, Deserialize)]
pub struct ObserverInstall {
    pub installed: bool,
}

#[derive(Debug, Deserialize)]
pub struct MutationCount {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct Clicked {
    pub clicked: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatusProbe {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClipboardText {
    pub text: Option<String>,
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Current document readiness. -> [`ReadyState`]
pub fn ready_state() -> String {
    "(() => ({ state: document.readyState }))()".to_string()
}

/// Inspect title and markup for anti-bot interstitial signatures.
/// -> [`BlockProbe`]
pub fn block_probe(markers: &[&str]) -> String {
    format!(
        r#"(() => {{
  const markers = {markers};
  const title = (document.title || '').toLowerCase();
  const markup = document.documentElement
    ? document.documentElement.innerHTML.slice(0, 20000).toLowerCase()
    : '';
  const blocked = markers.some(m => title.includes(m) || markup.includes(m));
  return {{ title: document.title || '', blocked }};
}})()"#,
        markers = js_list(markers)
    )
}

/// First present candidate input surface and whether it is disabled.
/// -> [`ComposerProbe`]
pub fn composer_probe(selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
  const sels = {sels};
  for (const sel of sels) {{
    const el = document.querySelector(sel);
    if (!el) continue;
    const disabled = el.disabled === true
      || el.getAttribute('aria-disabled') === 'true'
      || el.getAttribute('contenteditable') === 'false';
    return {{ found: true, selector: sel, disabled }};
  }}
  return {{ found: false, selector: null, disabled: false }};
}})()"#,
        sels = js_list(selectors)
    )
}

/// Dispatch a full synthetic pointer sequence on the first present
/// candidate. -> [`ClickOutcome`]
pub fn pointer_click(selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
  const sels = {sels};
  for (const sel of sels) {{
    const el = document.querySelector(sel);
    if (!el) continue;
    const rect = el.getBoundingClientRect();
    const opts = {{
      bubbles: true, cancelable: true,
      clientX: rect.x + rect.width / 2, clientY: rect.y + rect.height / 2,
    }};
    el.dispatchEvent(new PointerEvent('pointerdown', opts));
    el.dispatchEvent(new MouseEvent('mousedown', opts));
    el.dispatchEvent(new PointerEvent('pointerup', opts));
    el.dispatchEvent(new MouseEvent('mouseup', opts));
    el.dispatchEvent(new MouseEvent('click', opts));
    return {{ clicked: true, selector: sel }};
  }}
  return {{ clicked: false, selector: null }};
}})()"#,
        sels = js_list(selectors)
    )
}

/// Visible label of the model-switcher control. -> [`SwitcherLabel`]
pub fn switcher_label(selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
  const sels = {sels};
  for (const sel of sels) {{
    const el = document.querySelector(sel);
    if (el) return {{ label: (el.innerText || '').trim() }};
  }}
  return {{ label: null }};
}})()"#,
        sels = js_list(selectors)
    )
}

/// Collect open-menu entries with label text and test id, in document
/// order without duplicates. -> [`MenuOptions`]
pub fn menu_options(selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
  const sels = {sels};
  const seen = new Set();
  const options = [];
  for (const sel of sels) {{
    for (const el of document.querySelectorAll(sel)) {{
      if (seen.has(el)) continue;
      seen.add(el);
      options.push({{
        label: (el.innerText || '').trim(),
        testId: el.getAttribute('data-testid'),
      }});
    }}
  }}
  return {{ options }};
}})()"#,
        sels = js_list(selectors)
    )
}

/// Click the `index`-th entry of the same collection [`menu_options`]
/// builds, so indices line up between the two calls. -> [`Clicked`]
pub fn click_menu_option(selectors: &[&str], index: usize) -> String {
    format!(
        r#"(() => {{
  const sels = {sels};
  const seen = new Set();
  const els = [];
  for (const sel of sels) {{
    for (const el of document.querySelectorAll(sel)) {{
      if (!seen.has(el)) {{ seen.add(el); els.push(el); }}
    }}
  }}
  const el = els[{index}];
  if (!el) return {{ clicked: false }};
  const rect = el.getBoundingClientRect();
  const opts = {{
    bubbles: true, cancelable: true,
    clientX: rect.x + rect.width / 2, clientY: rect.y + rect.height / 2,
  }};
  el.dispatchEvent(new PointerEvent('pointerdown', opts));
  el.dispatchEvent(new MouseEvent('mousedown', opts));
  el.dispatchEvent(new PointerEvent('pointerup', opts));
  el.dispatchEvent(new MouseEvent('mouseup', opts));
  el.dispatchEvent(new MouseEvent('click', opts));
  return {{ clicked: true }};
}})()"#,
        sels = js_list(selectors)
    )
}

/// Pointer + focus + collapse-selection-to-end on the first present
/// composer candidate. -> [`FocusOutcome`]
pub fn focus_composer(selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
  const sels = {sels};
  for (const sel of sels) {{
    const el = document.querySelector(sel);
    if (!el) continue;
    const rect = el.getBoundingClientRect();
    const opts = {{
      bubbles: true, cancelable: true,
      clientX: rect.x + rect.width / 2, clientY: rect.y + rect.height / 2,
    }};
    el.dispatchEvent(new PointerEvent('pointerdown', opts));
    el.dispatchEvent(new MouseEvent('mousedown', opts));
    el.dispatchEvent(new PointerEvent('pointerup', opts));
    el.dispatchEvent(new MouseEvent('mouseup', opts));
    el.dispatchEvent(new MouseEvent('click', opts));
    el.focus();
    const selection = window.getSelection();
    if (selection && el.childNodes.length) {{
      const range = document.createRange();
      range.selectNodeContents(el);
      range.collapse(false);
      selection.removeAllRanges();
      selection.addRange(range);
    }}
    const focused = document.activeElement === el || el.contains(document.activeElement);
    return {{ focused, selector: sel }};
  }}
  return {{ focused: false, selector: null }};
}})()"#,
        sels = js_list(selectors)
    )
}

/// Current text of the first present composer candidate (editor content or
/// form-field value). -> [`ComposerText`]
pub fn composer_text(selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
  const sels = {sels};
  for (const sel of sels) {{
    const el = document.querySelector(sel);
    if (!el) continue;
    const text = (el.tagName === 'TEXTAREA' || el.tagName === 'INPUT')
      ? el.value
      : (el.innerText || el.textContent || '');
    return {{ text: (text || '').trim() }};
  }}
  return {{ text: '' }};
}})()"#,
        sels = js_list(selectors)
    )
}

/// Write text straight into the composer when synthetic insertion did not
/// land, firing an input event so framework state catches up.
/// -> [`ForceWrite`]
pub fn force_write(selectors: &[&str], text: &str) -> String {
    format!(
        r#"(() => {{
  const sels = {sels};
  const text = {text};
  for (const sel of sels) {{
    const el = document.querySelector(sel);
    if (!el) continue;
    el.focus();
    if (el.tagName === 'TEXTAREA' || el.tagName === 'INPUT') {{
      el.value = text;
    }} else {{
      el.innerText = text;
    }}
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    return {{ ok: true }};
  }}
  return {{ ok: false }};
}})()"#,
        sels = js_list(selectors),
        text = js_str(text)
    )
}

/// Whether the submitted prompt text is visible as a user turn.
/// -> [`Confirmed`]
pub fn submit_confirmed(selectors: &[&str], needle: &str) -> String {
    format!(
        r#"(() => {{
  const sels = {sels};
  const needle = {needle};
  for (const sel of sels) {{
    for (const turn of document.querySelectorAll(sel)) {{
      if ((turn.innerText || '').includes(needle)) return {{ confirmed: true }};
    }}
  }}
  return {{ confirmed: false }};
}})()"#,
        sels = js_list(selectors),
        needle = js_str(needle)
    )
}

/// Composite post-upload condition: no upload indicator remains and a send
/// control is enabled. -> [`UploadState`]
pub fn upload_state(upload_indicators: &[&str], send_selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
  const uploadSels = {upload};
  const sendSels = {send};
  const uploading = uploadSels.some(sel => document.querySelector(sel) !== null);
  let sendEnabled = false;
  for (const sel of sendSels) {{
    const btn = document.querySelector(sel);
    if (btn) {{
      sendEnabled = !(btn.disabled === true || btn.getAttribute('aria-disabled') === 'true');
      break;
    }}
  }}
  return {{ uploading, sendEnabled }};
}})()"#,
        upload = js_list(upload_indicators),
        send = js_list(send_selectors)
    )
}

/// Most recent assistant turn plus the generating-indicator state.
/// -> [`ResponseProbe`]
pub fn response_probe(turn_selectors: &[&str], working_selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
  const turnSels = {turns};
  const workSels = {work};
  let last = null;
  for (const sel of turnSels) {{
    const nodes = document.querySelectorAll(sel);
    if (nodes.length) {{ last = nodes[nodes.length - 1]; break; }}
  }}
  const generating = workSels.some(sel => {{
    const el = document.querySelector(sel);
    return el !== null && el.offsetParent !== null;
  }});
  if (!last) return {{ found: false, text: '', html: null, turnId: null, generating }};
  const container = last.closest('article') || last;
  const turnId = container.getAttribute('data-testid')
    || last.getAttribute('data-message-id');
  return {{
    found: true,
    text: (last.innerText || '').trim(),
    html: last.innerHTML || null,
    turnId,
    generating,
  }};
}})()"#,
        turns = js_list(turn_selectors),
        work = js_list(working_selectors)
    )
}

/// Install a body-wide mutation observer feeding a counter the response
/// wait reads; installing twice is a no-op. -> [`ObserverInstall`]
pub fn install_mutation_observer() -> String {
    r#"(() => {
  if (window.__cpObserver) return { installed: true };
  window.__cpMutations = 0;
  const obs = new MutationObserver(() => {
    window.__cpMutations = (window.__cpMutations || 0) + 1;
  });
  obs.observe(document.body, { childList: true, subtree: true, characterData: true });
  window.__cpObserver = obs;
  return { installed: true };
})()"#
        .to_string()
}

/// Read the observer's mutation counter. -> [`MutationCount`]
pub fn mutation_count() -> String {
    "(() => ({ count: window.__cpMutations || 0 }))()".to_string()
}

/// Safety net during the response wait: click a stop-generating control if
/// it is visible and not itself mid-stop. -> [`Clicked`]
pub fn stop_safety(selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
  const sels = {sels};
  for (const sel of sels) {{
    const btn = document.querySelector(sel);
    if (!btn) continue;
    const visible = btn.offsetParent !== null;
    const busy = btn.disabled === true
      || btn.getAttribute('aria-disabled') === 'true'
      || btn.getAttribute('data-state') === 'loading';
    if (visible && !busy) {{ btn.click(); return {{ clicked: true }}; }}
  }}
  return {{ clicked: false }};
}})()"#,
        sels = js_list(selectors)
    )
}

/// Sample the first visible working indicator for the status poller.
/// -> [`StatusProbe`]
pub fn status_probe(selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
  const sels = {sels};
  for (const sel of sels) {{
    const el = document.querySelector(sel);
    if (el && el.offsetParent !== null) {{
      const label = el.getAttribute('aria-label') || (el.innerText || '').trim();
      return {{ message: label || 'working' }};
    }}
  }}
  return {{ message: null }};
}})()"#,
        sels = js_list(selectors)
    )
}

/// Intercept clipboard writes so the copy affordance's payload can be read
/// back without clipboard permissions. -> [`ObserverInstall`]
pub fn clipboard_hook() -> String {
    r#"(() => {
  if (window.__cpClipboardHooked) return { installed: true };
  window.__cpClipboard = null;
  if (navigator.clipboard && navigator.clipboard.writeText) {
    const original = navigator.clipboard.writeText.bind(navigator.clipboard);
    navigator.clipboard.writeText = (text) => {
      window.__cpClipboard = String(text);
      return original(text).catch(() => {});
    };
  }
  document.addEventListener('copy', (e) => {
    if (e.clipboardData) {
      const data = e.clipboardData.getData('text/plain');
      if (data) window.__cpClipboard = data;
    }
  }, true);
  window.__cpClipboardHooked = true;
  return { installed: true };
})()"#
        .to_string()
}

/// Click the copy affordance, scoped to the matched turn when its id is
/// known, else the last copy control on the page. -> [`Clicked`]
pub fn copy_click(selectors: &[&str], turn_id: Option<&str>) -> String {
    let turn_id_js = match turn_id {
        Some(id) => js_str(id),
        None => "null".to_string(),
    };
    format!(
        r#"(() => {{
  const sels = {sels};
  const turnId = {turn_id};
  let scope = document;
  if (turnId) {{
    const container = [...document.querySelectorAll('[data-testid]')]
      .find(el => el.getAttribute('data-testid') === turnId);
    if (container) scope = container;
  }}
  let last = null;
  for (const sel of sels) {{
    const btns = scope.querySelectorAll(sel);
    if (btns.length) {{ last = btns[btns.length - 1]; break; }}
  }}
  if (!last) return {{ clicked: false }};
  last.click();
  return {{ clicked: true }};
}})()"#,
        sels = js_list(selectors),
        turn_id = turn_id_js
    )
}

/// Read back whatever the clipboard hook captured. -> [`ClipboardText`]
pub fn clipboard_read() -> String {
    r#"(() => {
  const text = window.__cpClipboard;
  return { text: (typeof text === 'string' && text.length) ? text : null };
})()"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_embed_serialized_inputs() {
        let q = composer_probe(&["#a", "div[contenteditable='true']"]);
        assert!(q.contains(r##"["#a","div[contenteditable='true']"]"##));

        let q = force_write(&["#a"], "line1\n\"quoted\"");
        assert!(q.contains("\"line1\\n\\\"quoted\\\"\""));

        let q = click_menu_option(&["[role='menuitem']"], 3);
        assert!(q.contains("els[3]"));

        let q = copy_click(&["button"], Some("conversation-turn-7"));
        assert!(q.contains(r#""conversation-turn-7""#));
        let q = copy_click(&["button"], None);
        assert!(q.contains("const turnId = null"));
    }

    #[test]
    fn composer_probe_shape_deserializes() {
        let hit: ComposerProbe =
            serde_json::from_str(r##"{"found":true,"selector":"#prompt-textarea","disabled":false}"##)
                .unwrap();
        assert!(hit.found);
        assert_eq!(hit.selector.as_deref(), Some("#prompt-textarea"));

        let miss: ComposerProbe =
            serde_json::from_str(r#"{"found":false,"selector":null,"disabled":false}"#).unwrap();
        assert!(!miss.found);
    }

    #[test]
    fn response_probe_shape_deserializes() {
        let payload = r#"{
            "found": true,
            "text": "Hi there",
            "html": "<p>Hi there</p>",
            "turnId": "conversation-turn-3",
            "generating": true
        }"#;
        let probe: ResponseProbe = serde_json::from_str(payload).unwrap();
        assert_eq!(probe.text, "Hi there");
        assert_eq!(probe.turn_id.as_deref(), Some("conversation-turn-3"));
        assert!(probe.generating);

        let empty: ResponseProbe = serde_json::from_str(
            r#"{"found":false,"text":"","html":null,"turnId":null,"generating":false}"#,
        )
        .unwrap();
        assert!(!empty.found);
    }

    #[test]
    fn menu_options_shape_deserializes() {
        let payload = r#"{"options":[
            {"label":"ChatGPT 5.1 Instant","testId":"model-switcher-chatgpt-5-1-instant"},
            {"label":"Auto","testId":null}
        ]}"#;
        let menu: MenuOptions = serde_json::from_str(payload).unwrap();
        assert_eq!(menu.options.len(), 2);
        assert_eq!(menu.options[1].test_id, None);
    }

    #[test]
    fn upload_state_shape_deserializes() {
        let state: UploadState =
            serde_json::from_str(r#"{"uploading":false,"sendEnabled":true}"#).unwrap();
        assert!(!state.uploading);
        assert!(state.send_enabled);
    }

    #[test]
    fn scalar_shapes_deserialize() {
        let s: ReadyState = serde_json::from_str(r#"{"state":"interactive"}"#).unwrap();
        assert_eq!(s.state, "interactive");
        let b: BlockProbe =
            serde_json::from_str(r#"{"title":"Just a moment...","blocked":true}"#).unwrap();
        assert!(b.blocked);
        let c: ClipboardText = serde_json::from_str(r#"{"text":null}"#).unwrap();
        assert!(c.text.is_none());
        let m: MutationCount = serde_json::from_str(r#"{"count":42}"#).unwrap();
        assert_eq!(m.count, 42);
    }
}

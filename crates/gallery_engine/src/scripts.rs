//! Page-side scripts. Each reads its inputs from `arguments[i]` and returns a
//! JSON-serializable value.

/// Collects image candidates from `arguments[0]`'s subtree: primary sources,
/// deferred-load attributes and computed background images, in page order.
pub const COLLECT_CANDIDATES: &str = r#"
const root = arguments[0];
const out = [];
const absolute = (value) => {
  if (!value) return null;
  try { return new URL(value, document.baseURI).href; } catch (e) { return null; }
};
const push = (url, label, channel) => {
  if (url) out.push({ url: String(url), label: label || null, channel });
};
const firstSrcset = (value) => {
  if (!value) return null;
  const first = value.split(',')[0].trim().split(/\s+/)[0];
  return first || null;
};
root.querySelectorAll('img').forEach((img) => {
  push(img.currentSrc || img.src, img.alt, 'source');
});
root.querySelectorAll('img, [data-src], [data-lazy-src], [data-image-src], [srcset]').forEach((el) => {
  const label = el.getAttribute('alt');
  for (const attr of ['data-src', 'data-lazy-src', 'data-image-src']) {
    push(absolute(el.getAttribute(attr)), label, 'deferred');
  }
  push(absolute(firstSrcset(el.getAttribute('srcset'))), label, 'deferred');
});
const backgrounds = (el) => {
  const bg = window.getComputedStyle(el).backgroundImage;
  if (!bg || bg === 'none') return;
  const pattern = /url\(["']?([^"')]+)["']?\)/g;
  let match;
  while ((match = pattern.exec(bg)) !== null) {
    push(absolute(match[1]), el.getAttribute('aria-label'), 'background');
  }
};
backgrounds(root);
root.querySelectorAll('*').forEach(backgrounds);
return out;
"#;

/// Document-wide image candidates with their reported pixel area, flagged
/// when they sit inside a section marked as the page's hero.
pub const HERO_CANDIDATES: &str = r#"
const out = [];
const heroSections = [
  'section[class*="hero"] img',
  'div[class*="hero"] img',
  'section[id*="hero"] img',
  'div[id*="hero"] img',
  'img[alt*="hero" i]',
].join(', ');
document.querySelectorAll('img').forEach((img) => {
  const attr = (name) => parseInt(img.getAttribute(name) || '0', 10) || 0;
  const width = img.naturalWidth || attr('width');
  const height = img.naturalHeight || attr('height');
  const url = img.currentSrc || img.src;
  const hero_hint = img.matches(heroSections);
  if (url) out.push({ url, label: img.alt || null, channel: 'source', area: width * height, hero_hint });
});
return out;
"#;

pub const SCROLL_INTO_VIEW: &str = r#"
arguments[0].scrollIntoView({ behavior: 'smooth', block: 'center' });
return null;
"#;

pub const SCROLL_TO_BOTTOM: &str = r#"
window.scrollTo(0, document.body.scrollHeight);
return null;
"#;

pub const OUTER_HTML: &str = "return arguments[0].outerHTML;";

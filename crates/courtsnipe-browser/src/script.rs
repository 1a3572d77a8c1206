//! Generated Node.js programs: the long-lived bridge and the one-shot login job.

use anyhow::Result;
use serde::Serialize;

use crate::protocol::REPLY_MARKER;
use crate::runtime::{LOAD_PLAYWRIGHT_JS, RESULT_MARKER};

/// Login form selectors the bridge needs before any [`crate::SiteSelectors`] lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginSelectors {
    pub email: String,
    pub password: String,
    pub login_button: String,
    pub scheduler: String,
}

/// Everything the bridge needs at startup, embedded into the script as JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BridgeLaunch {
    pub headless: bool,
    pub user_agent: Option<String>,
    pub storage_state: Option<String>,
    pub scheduler_url: String,
    pub login_marker: String,
    pub post_login_pattern: String,
    /// Sign in again when the stored session has expired. The password comes
    /// from the environment, never from the script.
    pub username: Option<String>,
    pub action_timeout_ms: u64,
    pub selectors: LoginSelectors,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginJob {
    pub headless: bool,
    pub user_agent: Option<String>,
    pub login_url: String,
    pub post_login_pattern: String,
    pub username: String,
    pub storage_state: String,
    pub timeout_ms: u64,
    pub selectors: LoginSelectors,
}

pub(crate) fn build_bridge_script(launch: &BridgeLaunch) -> Result<String> {
    let launch_literal = serde_json::to_string(launch)?;

    let mut script = String::new();
    script.push_str("import fs from 'node:fs';\n");
    script.push_str("import readline from 'node:readline';\n");
    script.push_str(LOAD_PLAYWRIGHT_JS);
    script.push('\n');
    script.push_str(&format!("const REPLY_MARKER = '{REPLY_MARKER}';\n"));
    script.push_str(&format!("const launch = {launch_literal};\n\n"));

    script.push_str("function reply(id, ok, payload) {\n");
    script.push_str("  const body = ok ? { id, ok: true, value: payload ?? null } : { id, ok: false, error: payload };\n");
    script.push_str("  process.stdout.write(`${REPLY_MARKER}${JSON.stringify(body)}\\n`);\n");
    script.push_str("}\n\n");
    script.push_str("function describe(error) {\n");
    script.push_str("  return error && error.stack ? error.stack : String(error);\n");
    script.push_str("}\n\n");

    script.push_str("let browser;\n");
    script.push_str("let context;\n");
    script.push_str("let page;\n");
    script.push_str("try {\n");
    script.push_str("  const chromium = await loadChromium();\n");
    script.push_str("  browser = await chromium.launch({ headless: launch.headless });\n");
    script.push_str("  const contextOptions = {};\n");
    script.push_str("  if (launch.userAgent) {\n");
    script.push_str("    contextOptions.userAgent = launch.userAgent;\n");
    script.push_str("  }\n");
    script.push_str("  if (launch.storageState && fs.existsSync(launch.storageState)) {\n");
    script.push_str("    contextOptions.storageState = launch.storageState;\n");
    script.push_str("  }\n");
    script.push_str("  context = await browser.newContext(contextOptions);\n");
    script.push_str("  context.setDefaultTimeout(launch.actionTimeoutMs);\n");
    script.push_str("  await context.tracing.start({ screenshots: true, snapshots: true });\n");
    script.push_str("  page = await context.newPage();\n");
    script.push_str("  await page.goto(launch.schedulerUrl, { waitUntil: 'load' });\n");
    script.push_str("  let signedIn = false;\n");
    script.push_str("  if (page.url().includes(launch.loginMarker) && launch.username && process.env.COURTSNIPE_PASSWORD) {\n");
    script.push_str("    await page.fill(launch.selectors.email, launch.username);\n");
    script.push_str("    await page.fill(launch.selectors.password, process.env.COURTSNIPE_PASSWORD);\n");
    script.push_str("    await page.click(launch.selectors.loginButton);\n");
    script.push_str("    await page.waitForURL(launch.postLoginPattern, { timeout: 15000 }).catch(() => {});\n");
    script.push_str("    await page.goto(launch.schedulerUrl, { waitUntil: 'load' });\n");
    script.push_str("    signedIn = true;\n");
    script.push_str("  }\n");
    script.push_str("  reply(0, true, { url: page.url(), signedIn });\n");
    script.push_str("} catch (error) {\n");
    script.push_str("  process.stderr.write(describe(error) + '\\n');\n");
    script.push_str("  reply(0, false, describe(error));\n");
    script.push_str("  await browser?.close().catch(() => {});\n");
    script.push_str("  process.exit(1);\n");
    script.push_str("}\n\n");

    script.push_str("async function widgetCall(ref, action, arg) {\n");
    script.push_str("  return page.evaluate(([ref, action, arg]) => {\n");
    script.push_str("    const widget = window.$ ? $(ref.selector).data(ref.kind) : undefined;\n");
    script.push_str("    if (action === 'read') {\n");
    script.push_str("      if (!widget) return [];\n");
    script.push_str("      const items = ref.filtered ? widget.dataSource.view() : widget.dataSource.data();\n");
    script.push_str("      const field = widget.options.dataTextField || 'Text';\n");
    script.push_str("      return Array.from(items, (item) => String(typeof item === 'object' ? (item[field] ?? '') : item));\n");
    script.push_str("    }\n");
    script.push_str("    if (action === 'text') {\n");
    script.push_str("      return widget ? widget.text() : null;\n");
    script.push_str("    }\n");
    script.push_str("    if (!widget) throw new Error(`${ref.kind} widget not found at ${ref.selector}`);\n");
    script.push_str("    widget.select(arg);\n");
    script.push_str("    widget.trigger('change');\n");
    script.push_str("    if (ref.closeAfterSelect) widget.close();\n");
    script.push_str("    return null;\n");
    script.push_str("  }, [ref, action, arg ?? null]);\n");
    script.push_str("}\n\n");

    script.push_str("async function handle(request) {\n");
    script.push_str("  switch (request.op) {\n");

    script.push_str("    case 'readDate': {\n");
    script.push_str("      return page.evaluate((selector) => {\n");
    script.push_str("        const scheduler = window.$ ? $(selector).data('kendoScheduler') : undefined;\n");
    script.push_str("        if (!scheduler) return null;\n");
    script.push_str("        const d = scheduler.date();\n");
    script.push_str("        const pad = (n) => String(n).padStart(2, '0');\n");
    script.push_str("        return `${d.getFullYear()}-${pad(d.getMonth() + 1)}-${pad(d.getDate())}`;\n");
    script.push_str("      }, launch.selectors.scheduler);\n");
    script.push_str("    }\n");

    script.push_str("    case 'setDate': {\n");
    script.push_str("      await page.evaluate(([selector, iso]) => {\n");
    script.push_str("        const scheduler = $(selector).data('kendoScheduler');\n");
    script.push_str("        if (!scheduler) throw new Error('scheduler widget not found');\n");
    script.push_str("        const [y, m, d] = iso.split('-').map(Number);\n");
    script.push_str("        scheduler.date(new Date(y, m - 1, d));\n");
    script.push_str("      }, [launch.selectors.scheduler, request.date]);\n");
    script.push_str("      return null;\n");
    script.push_str("    }\n");

    script.push_str("    case 'reload': {\n");
    script.push_str("      await page.evaluate((selector) => {\n");
    script.push_str("        const scheduler = $(selector).data('kendoScheduler');\n");
    script.push_str("        if (!scheduler) throw new Error('scheduler widget not found');\n");
    script.push_str("        scheduler.dataSource.read();\n");
    script.push_str("      }, launch.selectors.scheduler);\n");
    script.push_str("      await page.waitForLoadState('networkidle');\n");
    script.push_str("      return null;\n");
    script.push_str("    }\n");

    script.push_str("    case 'waitForText':\n");
    script.push_str("    case 'waitForVisible': {\n");
    script.push_str("      let locator = page.locator(request.selector);\n");
    script.push_str("      if (request.op === 'waitForText') {\n");
    script.push_str("        locator = locator.filter({ hasText: request.text });\n");
    script.push_str("      }\n");
    script.push_str("      try {\n");
    script.push_str("        await locator.first().waitFor({ state: 'visible', timeout: request.timeoutMs });\n");
    script.push_str("        return true;\n");
    script.push_str("      } catch (error) {\n");
    script.push_str("        if (error && error.name === 'TimeoutError') return false;\n");
    script.push_str("        throw error;\n");
    script.push_str("      }\n");
    script.push_str("    }\n");

    script.push_str("    case 'snapshot': {\n");
    script.push_str("      return page.evaluate((selector) => {\n");
    script.push_str("        const scheduler = $(selector).data('kendoScheduler');\n");
    script.push_str("        if (!scheduler) throw new Error('scheduler widget not found');\n");
    script.push_str("        const pad = (n) => String(n).padStart(2, '0');\n");
    script.push_str("        const local = (d) => `${d.getFullYear()}-${pad(d.getMonth() + 1)}-${pad(d.getDate())}T${pad(d.getHours())}:${pad(d.getMinutes())}:${pad(d.getSeconds())}`;\n");
    script.push_str("        const units = Array.from(scheduler.resources[0].dataSource.data(), (r) => String(r.Value));\n");
    script.push_str("        const events = Array.from(scheduler.dataSource.data(), (e) => ({\n");
    script.push_str("          unit: String(e.CourtLabel),\n");
    script.push_str("          start: local(e.start),\n");
    script.push_str("          end: local(e.end),\n");
    script.push_str("        }));\n");
    script.push_str("        return { date: local(scheduler.date()).slice(0, 10), units, events };\n");
    script.push_str("      }, launch.selectors.scheduler);\n");
    script.push_str("    }\n");

    script.push_str("    case 'isVisible': {\n");
    script.push_str("      return page.locator(request.selector).first().isVisible();\n");
    script.push_str("    }\n");

    script.push_str("    case 'click': {\n");
    script.push_str("      await page.locator(request.selector).first().click();\n");
    script.push_str("      return null;\n");
    script.push_str("    }\n");

    script.push_str("    case 'type': {\n");
    script.push_str("      await page.locator(request.selector).first().click();\n");
    script.push_str("      await page.keyboard.press('Control+A');\n");
    script.push_str("      await page.keyboard.press('Backspace');\n");
    script.push_str("      await page.keyboard.type(request.text, { delay: request.delayMs });\n");
    script.push_str("      return null;\n");
    script.push_str("    }\n");

    script.push_str("    case 'readDataset': {\n");
    script.push_str("      return widgetCall(request.widget, 'read');\n");
    script.push_str("    }\n");

    script.push_str("    case 'selectOption': {\n");
    script.push_str("      return widgetCall(request.widget, 'select', request.index);\n");
    script.push_str("    }\n");

    script.push_str("    case 'selectedText': {\n");
    script.push_str("      return widgetCall(request.widget, 'text');\n");
    script.push_str("    }\n");

    script.push_str("    case 'isChecked': {\n");
    script.push_str("      return page.evaluate((selector) => {\n");
    script.push_str("        const element = document.querySelector(selector);\n");
    script.push_str("        return Boolean(element && element.checked);\n");
    script.push_str("      }, request.selector);\n");
    script.push_str("    }\n");

    script.push_str("    case 'screenshot': {\n");
    script.push_str("      await page.screenshot({ path: request.path });\n");
    script.push_str("      return request.path;\n");
    script.push_str("    }\n");

    script.push_str("    case 'close': {\n");
    script.push_str("      try {\n");
    script.push_str("        if (request.tracePath) {\n");
    script.push_str("          await context.tracing.stop({ path: request.tracePath });\n");
    script.push_str("        } else {\n");
    script.push_str("          await context.tracing.stop();\n");
    script.push_str("        }\n");
    script.push_str("      } finally {\n");
    script.push_str("        await context.close().catch(() => {});\n");
    script.push_str("        await browser.close().catch(() => {});\n");
    script.push_str("      }\n");
    script.push_str("      return request.tracePath ?? null;\n");
    script.push_str("    }\n");

    script.push_str("    default:\n");
    script.push_str("      throw new Error(`Unsupported bridge op: ${request.op}`);\n");
    script.push_str("  }\n");
    script.push_str("}\n\n");

    script.push_str("const lines = readline.createInterface({ input: process.stdin, crlfDelay: Infinity });\n");
    script.push_str("for await (const line of lines) {\n");
    script.push_str("  if (!line.trim()) continue;\n");
    script.push_str("  let request;\n");
    script.push_str("  try {\n");
    script.push_str("    request = JSON.parse(line);\n");
    script.push_str("  } catch (error) {\n");
    script.push_str("    process.stderr.write(`unreadable request: ${line}\\n`);\n");
    script.push_str("    continue;\n");
    script.push_str("  }\n");
    script.push_str("  try {\n");
    script.push_str("    reply(request.id, true, await handle(request));\n");
    script.push_str("  } catch (error) {\n");
    script.push_str("    reply(request.id, false, describe(error));\n");
    script.push_str("  }\n");
    script.push_str("  if (request.op === 'close') break;\n");
    script.push_str("}\n");
    script.push_str("await browser.close().catch(() => {});\n");
    script.push_str("process.exit(0);\n");

    Ok(script)
}

pub(crate) fn build_login_script(job: &LoginJob) -> Result<String> {
    let job_literal = serde_json::to_string(job)?;

    let mut script = String::new();
    script.push_str("import fs from 'node:fs';\n");
    script.push_str(LOAD_PLAYWRIGHT_JS);
    script.push('\n');
    script.push_str(&format!("const RESULT_MARKER = '{RESULT_MARKER}';\n"));
    script.push_str(&format!("const job = {job_literal};\n\n"));

    script.push_str("function finish(result) {\n");
    script.push_str("  process.stdout.write(`${RESULT_MARKER}${JSON.stringify(result)}\\n`);\n");
    script.push_str("}\n\n");

    script.push_str("let chromium;\n");
    script.push_str("try {\n");
    script.push_str("  chromium = await loadChromium();\n");
    script.push_str("} catch (error) {\n");
    script.push_str("  const message = error && error.stack ? error.stack : String(error);\n");
    script.push_str("  process.stderr.write(message + '\\n');\n");
    script.push_str("  finish({ success: false, error: message });\n");
    script.push_str("  process.exit(1);\n");
    script.push_str("}\n\n");

    script.push_str("const browser = await chromium.launch({ headless: job.headless });\n");
    script.push_str("const contextOptions = {};\n");
    script.push_str("if (job.userAgent) {\n");
    script.push_str("  contextOptions.userAgent = job.userAgent;\n");
    script.push_str("}\n");
    script.push_str("const context = await browser.newContext(contextOptions);\n");
    script.push_str("const page = await context.newPage();\n\n");

    script.push_str("try {\n");
    script.push_str("  await page.goto(job.loginUrl);\n");
    script.push_str("  await page.fill(job.selectors.email, job.username);\n");
    script.push_str("  await page.fill(job.selectors.password, process.env.COURTSNIPE_PASSWORD ?? '');\n");
    script.push_str("  await page.click(job.selectors.loginButton);\n");
    script.push_str("  await page.waitForURL(job.postLoginPattern, { timeout: job.timeoutMs });\n");
    script.push_str("  await fs.promises.mkdir(path.dirname(job.storageState), { recursive: true });\n");
    script.push_str("  await context.storageState({ path: job.storageState });\n");
    script.push_str("  finish({ success: true, url: page.url(), storageState: job.storageState });\n");
    script.push_str("} catch (error) {\n");
    script.push_str("  const message = error && error.stack ? error.stack : String(error);\n");
    script.push_str("  process.stderr.write(message + '\\n');\n");
    script.push_str("  finish({ success: false, error: message, url: page.url() });\n");
    script.push_str("  process.exitCode = 1;\n");
    script.push_str("} finally {\n");
    script.push_str("  await context.close().catch(() => {});\n");
    script.push_str("  await browser.close().catch(() => {});\n");
    script.push_str("}\n");

    Ok(script)
}

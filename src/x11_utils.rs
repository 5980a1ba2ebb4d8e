//! X11 implementation of the window-system collaborator interfaces.

use anyhow::{Context, Result};
use std::fs;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::shape;
use x11rb::protocol::xfixes::ConnectionExt as XfixesExt;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use crate::constants::x11::{ACTIVE_WINDOW_SOURCE_PAGER, OPACITY_SCALE};
use crate::types::{Rect, WindowHandle};
use crate::winsys::{ProcessInspector, WindowSystem, ZOrder};

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .context(format!("Failed to intern {name} atom"))?
        .reply()
        .context(format!("Failed to get reply for {name} atom"))?
        .atom)
}

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    pub net_client_list: Atom,
    pub net_wm_name: Atom,
    pub utf8_string: Atom,
    pub net_wm_pid: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_fullscreen: Atom,
    pub net_active_window: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_normal: Atom,
    pub net_wm_window_opacity: Atom,
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        // Do all intern_atom roundtrips once at startup
        Ok(Self {
            net_client_list: intern(conn, "_NET_CLIENT_LIST")?,
            net_wm_name: intern(conn, "_NET_WM_NAME")?,
            utf8_string: intern(conn, "UTF8_STRING")?,
            net_wm_pid: intern(conn, "_NET_WM_PID")?,
            net_wm_state: intern(conn, "_NET_WM_STATE")?,
            net_wm_state_fullscreen: intern(conn, "_NET_WM_STATE_FULLSCREEN")?,
            net_active_window: intern(conn, "_NET_ACTIVE_WINDOW")?,
            net_wm_window_type: intern(conn, "_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_normal: intern(conn, "_NET_WM_WINDOW_TYPE_NORMAL")?,
            net_wm_window_opacity: intern(conn, "_NET_WM_WINDOW_OPACITY")?,
        })
    }
}

/// Live X11 connection plus everything the collaborator traits need.
pub struct X11WindowSystem {
    conn: RustConnection,
    root: Window,
    screen_size: (i32, i32),
    atoms: CachedAtoms,
}

impl X11WindowSystem {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to X11 display")?;
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let screen_size = (
            i32::from(screen.width_in_pixels),
            i32::from(screen.height_in_pixels),
        );

        // XFixes version negotiation is required before shape requests
        conn.xfixes_query_version(5, 0)
            .context("Failed to query XFixes version")?
            .reply()
            .context("XFixes extension unavailable")?;

        let atoms = CachedAtoms::new(&conn)?;
        Ok(Self { conn, root, screen_size, atoms })
    }

    fn string_property(&self, window: Window, property: Atom, type_: Atom) -> Result<String> {
        let prop = self
            .conn
            .get_property(false, window, property, type_, 0, 1024)
            .context(format!("Failed to query string property for window {window}"))?
            .reply()
            .context(format!("Failed to get string property reply for window {window}"))?;
        Ok(String::from_utf8_lossy(&prop.value).into_owned())
    }

    fn atom_list(&self, window: Window, property: Atom) -> Result<Vec<Atom>> {
        let prop = self
            .conn
            .get_property(false, window, property, AtomEnum::ATOM, 0, 1024)
            .context(format!("Failed to query atom list for window {window}"))?
            .reply()
            .context(format!("Failed to get atom list reply for window {window}"))?;
        Ok(prop.value32().map(|v| v.collect()).unwrap_or_default())
    }

    fn pid_of(&self, window: Window) -> Result<Option<u32>> {
        let prop = self
            .conn
            .get_property(false, window, self.atoms.net_wm_pid, AtomEnum::CARDINAL, 0, 1)
            .context(format!("Failed to query _NET_WM_PID for window {window}"))?
            .reply()
            .context(format!("Failed to get _NET_WM_PID reply for window {window}"))?;
        Ok(prop.value32().and_then(|mut v| v.next()))
    }
}

impl WindowSystem for X11WindowSystem {
    fn enumerate_top_level(&self) -> Result<Vec<WindowHandle>> {
        let prop = self
            .conn
            .get_property(
                false,
                self.root,
                self.atoms.net_client_list,
                AtomEnum::WINDOW,
                0,
                u32::MAX,
            )
            .context("Failed to query _NET_CLIENT_LIST")?
            .reply()
            .context("Failed to get reply for _NET_CLIENT_LIST")?;
        let windows: Vec<Window> = prop
            .value32()
            .ok_or_else(|| anyhow::anyhow!("Invalid return from _NET_CLIENT_LIST"))?
            .collect();
        Ok(windows)
    }

    fn is_visible(&self, window: WindowHandle) -> Result<bool> {
        let attrs = self
            .conn
            .get_window_attributes(window)
            .context(format!("Failed to query attributes for window {window}"))?
            .reply()
            .context(format!("Failed to get attributes reply for window {window}"))?;
        Ok(attrs.map_state == MapState::VIEWABLE)
    }

    fn title(&self, window: WindowHandle) -> Result<String> {
        let title =
            self.string_property(window, self.atoms.net_wm_name, self.atoms.utf8_string)?;
        if !title.is_empty() {
            return Ok(title);
        }
        self.string_property(window, AtomEnum::WM_NAME.into(), AtomEnum::STRING.into())
    }

    fn is_normal_window(&self, window: WindowHandle) -> Result<bool> {
        let attrs = self
            .conn
            .get_window_attributes(window)
            .context(format!("Failed to query attributes for window {window}"))?
            .reply()
            .context(format!("Failed to get attributes reply for window {window}"))?;
        if attrs.override_redirect {
            return Ok(false);
        }
        let types = self.atom_list(window, self.atoms.net_wm_window_type)?;
        // No declared type means an ordinary application window
        Ok(types.is_empty() || types.contains(&self.atoms.net_wm_window_type_normal))
    }

    fn is_window(&self, window: WindowHandle) -> bool {
        self.conn
            .get_window_attributes(window)
            .map(|cookie| cookie.reply().is_ok())
            .unwrap_or(false)
    }

    fn window_rect(&self, window: WindowHandle) -> Result<Rect> {
        let geom = self
            .conn
            .get_geometry(window)
            .context(format!("Failed to query geometry for window {window}"))?
            .reply()
            .context(format!("Failed to get geometry reply for window {window}"))?;
        // Geometry is relative to the parent; translate to root coordinates
        let origin = self
            .conn
            .translate_coordinates(window, self.root, 0, 0)
            .context(format!("Failed to translate coordinates for window {window}"))?
            .reply()
            .context(format!("Failed to get translation reply for window {window}"))?;
        let left = i32::from(origin.dst_x);
        let top = i32::from(origin.dst_y);
        Ok(Rect::new(
            left,
            top,
            left + i32::from(geom.width),
            top + i32::from(geom.height),
        ))
    }

    fn set_opacity(&self, window: WindowHandle, opacity: u8) -> Result<()> {
        if opacity == u8::MAX {
            // Fully opaque: remove the property so compositors skip blending
            self.conn
                .delete_property(window, self.atoms.net_wm_window_opacity)
                .context(format!("Failed to delete opacity property for window {window}"))?;
        } else {
            self.conn
                .change_property32(
                    PropMode::REPLACE,
                    window,
                    self.atoms.net_wm_window_opacity,
                    AtomEnum::CARDINAL,
                    &[u32::from(opacity) * OPACITY_SCALE],
                )
                .context(format!("Failed to set opacity for window {window}"))?;
        }
        self.conn
            .flush()
            .context("Failed to flush X11 connection after opacity change")?;
        debug!(window = window, opacity = opacity, "opacity applied");
        Ok(())
    }

    fn set_click_through(&self, window: WindowHandle, enabled: bool) -> Result<()> {
        if enabled {
            // Empty input region: all mouse input falls through
            let region = self.conn.generate_id().context("Failed to allocate region id")?;
            self.conn
                .xfixes_create_region(region, &[])
                .context("Failed to create empty input region")?;
            self.conn
                .xfixes_set_window_shape_region(window, shape::SK::INPUT, 0, 0, region)
                .context(format!("Failed to set input region for window {window}"))?;
            self.conn
                .xfixes_destroy_region(region)
                .context("Failed to destroy input region")?;
        } else {
            self.conn
                .xfixes_set_window_shape_region(window, shape::SK::INPUT, 0, 0, x11rb::NONE)
                .context(format!("Failed to reset input region for window {window}"))?;
        }
        self.conn
            .flush()
            .context("Failed to flush X11 connection after input region change")?;
        Ok(())
    }

    fn move_resize(&self, window: WindowHandle, rect: Rect) -> Result<()> {
        self.conn
            .configure_window(
                window,
                &ConfigureWindowAux::new()
                    .x(rect.left)
                    .y(rect.top)
                    .width(rect.width().max(1) as u32)
                    .height(rect.height().max(1) as u32),
            )
            .context(format!("Failed to position window {window}"))?;
        self.conn
            .flush()
            .context("Failed to flush X11 connection after repositioning")?;
        Ok(())
    }

    fn set_foreground(&self, window: WindowHandle) -> Result<()> {
        // First, raise the window to top of stack
        self.conn
            .configure_window(
                window,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )
            .context(format!("Failed to raise window {window} to top of stack"))?;

        // Send _NET_ACTIVE_WINDOW client message to the root window
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window,
            type_: self.atoms.net_active_window,
            data: ClientMessageData::from([
                ACTIVE_WINDOW_SOURCE_PAGER,
                x11rb::CURRENT_TIME,
                0,
                0,
                0,
            ]),
        };
        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
                &event,
            )
            .context(format!("Failed to send _NET_ACTIVE_WINDOW event for window {window}"))?;

        self.conn
            .flush()
            .context("Failed to flush X11 connection after window activation")?;
        Ok(())
    }

    fn set_z_order(&self, window: WindowHandle, order: ZOrder) -> Result<()> {
        let mode = match order {
            ZOrder::Top => StackMode::ABOVE,
            ZOrder::Bottom => StackMode::BELOW,
        };
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().stack_mode(mode))
            .context(format!("Failed to restack window {window}"))?;
        self.conn
            .flush()
            .context("Failed to flush X11 connection after restacking")?;
        Ok(())
    }

    fn foreground_window(&self) -> Result<Option<WindowHandle>> {
        let prop = self
            .conn
            .get_property(
                false,
                self.root,
                self.atoms.net_active_window,
                AtomEnum::WINDOW,
                0,
                1,
            )
            .context("Failed to query _NET_ACTIVE_WINDOW")?
            .reply()
            .context("Failed to get reply for _NET_ACTIVE_WINDOW")?;
        Ok(prop
            .value32()
            .and_then(|mut v| v.next())
            .filter(|&w| w != x11rb::NONE))
    }

    fn primary_screen_size(&self) -> (i32, i32) {
        self.screen_size
    }

    fn is_fullscreen_style(&self, window: WindowHandle) -> Result<bool> {
        let attrs = self
            .conn
            .get_window_attributes(window)
            .context(format!("Failed to query attributes for window {window}"))?
            .reply()
            .context(format!("Failed to get attributes reply for window {window}"))?;
        if attrs.override_redirect {
            return Ok(true);
        }
        let states = self.atom_list(window, self.atoms.net_wm_state)?;
        Ok(states.contains(&self.atoms.net_wm_state_fullscreen))
    }
}

impl ProcessInspector for X11WindowSystem {
    fn process_name_for(&self, window: WindowHandle) -> Result<Option<String>> {
        let Some(pid) = self.pid_of(window)? else {
            debug!(window = window, "_NET_WM_PID not set");
            return Ok(None);
        };

        if let Ok(comm) = fs::read_to_string(format!("/proc/{pid}/comm")) {
            let name = comm.trim().to_lowercase();
            if !name.is_empty() {
                return Ok(Some(name));
            }
        }
        // Process may restrict comm; fall back to the executable link
        Ok(fs::read_link(format!("/proc/{pid}/exe"))
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_lowercase())))
    }
}

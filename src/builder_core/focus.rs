#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusPane {
    Palette,
    Canvas,
    Settings,
}

#[derive(Clone, Copy, Debug)]
pub struct FocusState {
    pub pane: FocusPane,
    /// Where focus returns once the settings pane closes.
    pub before_settings: FocusPane,
}

impl Default for FocusState {
    fn default() -> Self {
        Self::new(FocusPane::Canvas)
    }
}

impl FocusState {
    pub fn new(pane: FocusPane) -> Self {
        Self {
            pane,
            before_settings: pane,
        }
    }

    /// Tab order; the settings pane is only reachable while it is open.
    pub fn cycle(&mut self, settings_open: bool) {
        self.pane = match (self.pane, settings_open) {
            (FocusPane::Palette, _) => FocusPane::Canvas,
            (FocusPane::Canvas, true) => FocusPane::Settings,
            (FocusPane::Canvas, false) => FocusPane::Palette,
            (FocusPane::Settings, _) => FocusPane::Palette,
        };
    }

    pub fn enter_settings(&mut self) {
        if self.pane != FocusPane::Settings {
            self.before_settings = self.pane;
        }
        self.pane = FocusPane::Settings;
    }

    pub fn leave_settings(&mut self) {
        if self.pane == FocusPane::Settings {
            self.pane = self.before_settings;
        }
    }
}

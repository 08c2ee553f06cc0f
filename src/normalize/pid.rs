/// Proportional gain shared by the offset and gain loops.
pub const P_GAIN: f32 = 0.06;
/// Integral gain shared by the offset and gain loops.
pub const I_GAIN: f32 = 0.005;
/// Derivative gain shared by the offset and gain loops.
pub const D_GAIN: f32 = 0.0;
/// Initial output of the additive-offset loop.
pub const INIT_OFFSET: f32 = 0.0;
/// Initial output of the multiplicative-gain loop.
pub const INIT_GAIN: f32 = 1.0;

/// Discrete proportional-integral-derivative controller.
///
/// Each [`PidLoop::step`] feeds one observation; the loop output tracks
/// the observation stream with the configured gains. Flows without a
/// usable observation call [`PidLoop::coast`], which holds the output.
#[derive(Debug, Clone)]
pub struct PidLoop {
    kp: f32,
    ki: f32,
    kd: f32,
    integral: f32,
    previous_error: f32,
    output: f32,
}

impl PidLoop {
    /// Controller with explicit gains.
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            previous_error: 0.0,
            output: 0.0,
        }
    }

    /// Reset the loop: output jumps to `value`, accumulated state clears.
    pub fn initialize(&mut self, value: f32) {
        self.output = value;
        self.integral = 0.0;
        self.previous_error = 0.0;
    }

    /// Feed one observation and return the updated output.
    pub fn step(&mut self, observation: f32) -> f32 {
        let error = observation - self.output;
        self.integral += error;
        let derivative = error - self.previous_error;
        self.previous_error = error;
        self.output += self.kp * error + self.ki * self.integral + self.kd * derivative;
        self.output
    }

    /// No observation this step; hold and return the current output.
    #[inline]
    pub fn coast(&mut self) -> f32 {
        self.output
    }

    /// Current output without stepping.
    #[inline]
    pub fn output(&self) -> f32 {
        self.output
    }
}

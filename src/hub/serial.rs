// Hub serial protocol implementation
//
// Packet format: [0xFF, 0xFF, Module, Length, Instruction, Params..., Checksum]
// Response:      [0xFF, 0xFF, Module, Length, Status, Params..., Checksum]
// Length counts everything after itself. Multi-byte values are little-endian.

use serialport::{self, ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    AxisRemap, BulkData, FirmwareVersion, Hub, HubError, ImuHandle, ImuParameters, MIN_FIRMWARE,
    MOTOR_PORTS, MotorHandle, Orientation, PidfCoefficients, Result, RunMode, ServoHandle,
    ZeroPowerBehavior,
};

/// Default serial configuration for the hub link
pub const DEFAULT_BAUDRATE: u32 = 460_800;
pub const DEFAULT_TIMEOUT_MS: u64 = 50;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Bulk read payload: 4 x i32 positions + 4 x i16 velocities
const BULK_PAYLOAD_LEN: usize = MOTOR_PORTS * 4 + MOTOR_PORTS * 2;

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    QueryFirmware = 0x01,
    BulkRead = 0x10,
    SetMotorPower = 0x20,
    SetMotorMode = 0x21,
    SetZeroPowerBehavior = 0x22,
    SetPidf = 0x23,
    GetPidf = 0x24,
    SetServoPosition = 0x30,
    ImuConfigure = 0x40,
    ImuWriteRegister = 0x41,
    ImuReadOrientation = 0x42,
}

/// IMU registers touched by the axis remap
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum ImuRegister {
    AxisMapConfig = 0x41,
    AxisMapSign = 0x42,
}

/// Hub bus - handles serial communication with one or more hub modules
pub struct SerialHub {
    port: Box<dyn SerialPort>,
    modules: Vec<u8>,
}

impl SerialHub {
    /// Open a new connection to the hub bus; `modules` are the addresses
    /// checked by the firmware precondition
    pub fn open(port_name: &str, modules: &[u8]) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE, modules)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32, modules: &[u8]) -> Result<Self> {
        info!("Opening hub bus on {} at {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;
        Ok(Self::from_port(port, modules))
    }

    /// Wrap an already opened port, e.g. a pseudo-terminal
    pub fn from_port(port: Box<dyn SerialPort>, modules: &[u8]) -> Self {
        Self {
            port,
            modules: modules.to_vec(),
        }
    }

    /// One's complement of the byte sum, truncated to a byte
    fn checksum(data: &[u8]) -> u8 {
        !data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
    }

    /// Frame an instruction for `module`; the checksum covers module..params
    fn build_packet(module: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        // Length counts instruction, params and checksum
        let length = (params.len() + 2) as u8;
        let mut packet = HEADER.to_vec();
        packet.extend_from_slice(&[module, length, instruction as u8]);
        packet.extend_from_slice(params);
        packet.push(Self::checksum(&packet[HEADER.len()..]));
        packet
    }

    /// Validate a response body (status + params + checksum) and return params
    fn decode_response(module: u8, length: u8, body: &[u8]) -> Result<Vec<u8>> {
        let Some((&checksum, payload)) = body.split_last().filter(|(_, p)| !p.is_empty()) else {
            return Err(HubError::InvalidResponse {
                module,
                reason: format!("Response too short: {} bytes", body.len()),
            });
        };

        let mut covered = vec![module, length];
        covered.extend_from_slice(payload);
        if Self::checksum(&covered) != checksum {
            return Err(HubError::ChecksumMismatch { module });
        }

        match payload[0] {
            0 => Ok(payload[1..].to_vec()),
            status => Err(HubError::ModuleError { module, status }),
        }
    }

    /// Fill `buf` from the port; a read timeout belongs to `module`'s request
    fn read_into(&mut self, module: u8, buf: &mut [u8]) -> Result<()> {
        self.port.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut => HubError::Timeout { module },
            _ => HubError::Io(e),
        })
    }

    /// Read the reply to a request sent to `module` and return its params
    fn read_response(&mut self, module: u8) -> Result<Vec<u8>> {
        // Header, module, length
        let mut prefix = [0u8; 4];
        self.read_into(module, &mut prefix)?;

        if prefix[..2] != HEADER {
            return Err(HubError::InvalidResponse {
                module,
                reason: format!("Invalid header: {:02X?}", &prefix[..2]),
            });
        }
        let (from, length) = (prefix[2], prefix[3]);
        if from != module {
            return Err(HubError::InvalidResponse {
                module,
                reason: format!("Reply from module {} to a request for {}", from, module),
            });
        }

        let mut body = vec![0u8; length as usize];
        self.read_into(module, &mut body)?;
        Self::decode_response(module, length, &body)
    }

    /// Send one instruction and wait for its reply.
    ///
    /// Anything already waiting in the input buffer is a reply to an earlier
    /// request that timed out. It is dropped so it can't be taken for this
    /// request's answer.
    fn transact(&mut self, module: u8, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        let pending = self.port.bytes_to_read()?;
        if pending > 0 {
            debug!("Discarding {} late bytes before {:?} to module {}", pending, instruction, module);
        }
        self.port.clear(ClearBuffer::Input)?;

        let packet = Self::build_packet(module, instruction, params);
        self.port.write_all(&packet)?;
        self.port.flush()?;
        self.read_response(module)
    }

    fn expect_len(module: u8, response: &[u8], expected: usize) -> Result<()> {
        if response.len() < expected {
            return Err(HubError::InvalidResponse {
                module,
                reason: format!("Expected {} bytes, got {}", expected, response.len()),
            });
        }
        Ok(())
    }

    /// Query firmware version of one module
    pub fn firmware_version(&mut self, module: u8) -> Result<FirmwareVersion> {
        let response = self.transact(module, Instruction::QueryFirmware, &[])?;
        Self::expect_len(module, &response, 3)?;
        Ok(FirmwareVersion::new(response[0], response[1], response[2]))
    }
}

impl Hub for SerialHub {
    fn ensure_minimum_firmware(&mut self) -> Result<()> {
        for module in self.modules.clone() {
            let found = self.firmware_version(module)?;
            debug!("Module {} firmware {}", module, found);
            if found < MIN_FIRMWARE {
                return Err(HubError::FirmwareTooOld {
                    module,
                    found,
                    required: MIN_FIRMWARE,
                });
            }
        }
        Ok(())
    }

    fn bulk_read(&mut self, module: u8) -> Result<BulkData> {
        let response = self.transact(module, Instruction::BulkRead, &[])?;
        if response.is_empty() {
            return Err(HubError::NoBulkData { module });
        }
        Self::expect_len(module, &response, BULK_PAYLOAD_LEN)?;
        Ok(decode_bulk(module, &response))
    }

    fn set_motor_power(&mut self, motor: &MotorHandle, power: f64) -> Result<()> {
        let raw = encode_power(power).to_le_bytes();
        let params = [motor.port, raw[0], raw[1]];
        debug!("Set power on {}: {}", motor.name, power);
        self.transact(motor.module, Instruction::SetMotorPower, &params)?;
        Ok(())
    }

    fn set_motor_mode(&mut self, motor: &MotorHandle, mode: RunMode) -> Result<()> {
        debug!("Set mode on {}: {:?}", motor.name, mode);
        self.transact(
            motor.module,
            Instruction::SetMotorMode,
            &[motor.port, mode as u8],
        )?;
        Ok(())
    }

    fn set_zero_power_behavior(
        &mut self,
        motor: &MotorHandle,
        behavior: ZeroPowerBehavior,
    ) -> Result<()> {
        debug!("Set zero power behavior on {}: {:?}", motor.name, behavior);
        self.transact(
            motor.module,
            Instruction::SetZeroPowerBehavior,
            &[motor.port, behavior as u8],
        )?;
        Ok(())
    }

    fn set_pidf(
        &mut self,
        motor: &MotorHandle,
        mode: RunMode,
        coefficients: PidfCoefficients,
    ) -> Result<()> {
        let mut params = vec![motor.port, mode as u8];
        params.extend_from_slice(&encode_pidf(coefficients));
        debug!("Set PIDF on {}: {:?}", motor.name, coefficients);
        self.transact(motor.module, Instruction::SetPidf, &params)?;
        Ok(())
    }

    fn pidf(&mut self, motor: &MotorHandle, mode: RunMode) -> Result<PidfCoefficients> {
        let response = self.transact(
            motor.module,
            Instruction::GetPidf,
            &[motor.port, mode as u8],
        )?;
        Self::expect_len(motor.module, &response, 16)?;
        Ok(decode_pidf(&response))
    }

    fn set_servo_position(&mut self, servo: &ServoHandle, position: f64) -> Result<()> {
        let raw = encode_servo_position(position).to_le_bytes();
        debug!("Set servo {}: {}", servo.name, position);
        self.transact(
            servo.module,
            Instruction::SetServoPosition,
            &[servo.port, raw[0], raw[1]],
        )?;
        Ok(())
    }

    fn configure_imu(&mut self, imu: &ImuHandle, params: ImuParameters) -> Result<()> {
        self.transact(
            imu.module,
            Instruction::ImuConfigure,
            &[imu.port, params.angle_unit as u8],
        )?;
        Ok(())
    }

    fn remap_imu_axes(&mut self, imu: &ImuHandle, remap: AxisRemap) -> Result<()> {
        debug!(
            "Remap IMU {}: config=0x{:02X}, signs=0x{:02X}",
            imu.name, remap.config, remap.signs
        );
        self.transact(
            imu.module,
            Instruction::ImuWriteRegister,
            &[imu.port, ImuRegister::AxisMapConfig as u8, remap.config],
        )?;
        self.transact(
            imu.module,
            Instruction::ImuWriteRegister,
            &[imu.port, ImuRegister::AxisMapSign as u8, remap.signs],
        )?;
        Ok(())
    }

    fn angular_orientation(&mut self, imu: &ImuHandle) -> Result<Orientation> {
        let response = self.transact(imu.module, Instruction::ImuReadOrientation, &[imu.port])?;
        Self::expect_len(imu.module, &response, 12)?;
        Ok(Orientation {
            first_angle: read_f32(&response, 0) as f64,
            second_angle: read_f32(&response, 4) as f64,
            third_angle: read_f32(&response, 8) as f64,
        })
    }
}

/// Encode a power in [-1, 1] to the hub's signed 16-bit range (saturating)
fn encode_power(power: f64) -> i16 {
    (power.clamp(-1.0, 1.0) * i16::MAX as f64).round() as i16
}

/// Encode a servo position in [0, 1] to the full u16 range (saturating)
fn encode_servo_position(position: f64) -> u16 {
    (position.clamp(0.0, 1.0) * u16::MAX as f64).round() as u16
}

fn encode_pidf(c: PidfCoefficients) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (i, value) in [c.p, c.i, c.d, c.f].into_iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&(value as f32).to_le_bytes());
    }
    out
}

fn decode_pidf(bytes: &[u8]) -> PidfCoefficients {
    PidfCoefficients {
        p: read_f32(bytes, 0) as f64,
        i: read_f32(bytes, 4) as f64,
        d: read_f32(bytes, 8) as f64,
        f: read_f32(bytes, 12) as f64,
    }
}

fn decode_bulk(module: u8, bytes: &[u8]) -> BulkData {
    let mut data = BulkData {
        module,
        ..BulkData::default()
    };
    for port in 0..MOTOR_PORTS {
        let at = port * 4;
        data.positions[port] =
            i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    }
    let base = MOTOR_PORTS * 4;
    for port in 0..MOTOR_PORTS {
        let at = base + port * 2;
        data.velocities[port] = i16::from_le_bytes([bytes[at], bytes[at + 1]]) as i32;
    }
    data
}

fn read_f32(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
